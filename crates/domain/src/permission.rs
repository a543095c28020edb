use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use gatehouse_core::AppError;
use serde::{Deserialize, Serialize};

/// Permission identifier of the form `module:action`, e.g. `role:update`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionId {
    module: String,
    action: String,
}

impl PermissionId {
    /// Builds a permission identifier from its module and action parts.
    pub fn new(module: impl Into<String>, action: impl Into<String>) -> Result<Self, AppError> {
        let module = module.into();
        let action = action.into();
        validate_part("module", module.as_str())?;
        validate_part("action", action.as_str())?;

        Ok(Self { module, action })
    }

    /// Returns the module part (`role` in `role:update`).
    #[must_use]
    pub fn module(&self) -> &str {
        self.module.as_str()
    }

    /// Returns the action part (`update` in `role:update`).
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }
}

fn validate_part(label: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!(
            "permission {label} must not be empty"
        )));
    }

    let is_valid = value
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | '.'));
    if !is_valid {
        return Err(AppError::Validation(format!(
            "permission {label} '{value}' contains unsupported characters"
        )));
    }

    Ok(())
}

impl FromStr for PermissionId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((module, action)) = value.split_once(':') else {
            return Err(AppError::Validation(format!(
                "permission '{value}' must have the form module:action"
            )));
        };

        Self::new(module, action)
    }
}

impl TryFrom<String> for PermissionId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<PermissionId> for String {
    fn from(value: PermissionId) -> Self {
        value.to_string()
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.module, self.action)
    }
}

/// Effective permissions held by a caller. Membership is all that matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<PermissionId>);

impl PermissionSet {
    /// Creates an empty permission set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a set from storage or transport values, rejecting malformed entries.
    pub fn parse<I, S>(values: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| PermissionId::from_str(value.as_ref()))
            .collect()
    }

    /// Returns whether the permission is held.
    #[must_use]
    pub fn contains(&self, permission: &PermissionId) -> bool {
        self.0.contains(permission)
    }

    /// Adds a permission; returns `false` when it was already present.
    pub fn insert(&mut self, permission: PermissionId) -> bool {
        self.0.insert(permission)
    }

    /// Returns the number of distinct permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set holds no permission.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates permissions in stable order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionId> {
        self.0.iter()
    }
}

impl FromIterator<PermissionId> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = PermissionId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PermissionId> for PermissionSet {
    fn extend<T: IntoIterator<Item = PermissionId>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
