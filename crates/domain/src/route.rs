use std::fmt::{Display, Formatter};
use std::str::FromStr;

use gatehouse_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{PermissionId, PermissionSet};

/// Splits a request path into its non-empty segments.
///
/// Query strings and fragments are ignored, and duplicate or trailing
/// slashes do not produce empty segments.
#[must_use]
pub fn path_segments(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Normalizes a request path to its canonical `/a/b` form.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let segments = path_segments(path);
    if segments.is_empty() {
        return "/".to_owned();
    }

    segments.iter().fold(String::new(), |mut acc, segment| {
        acc.push('/');
        acc.push_str(segment);
        acc
    })
}

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteSegment {
    /// Must equal the request segment exactly.
    Literal(String),
    /// `[name]`: matches any single non-empty segment.
    Param(String),
    /// `[...name]`: matches one or more remaining segments.
    CatchAll(String),
    /// `[[...name]]`: matches the remaining segments, including none.
    OptionalCatchAll(String),
}

impl RouteSegment {
    fn is_catch_all(&self) -> bool {
        matches!(self, Self::CatchAll(_) | Self::OptionalCatchAll(_))
    }

    fn parse(raw: &str) -> Result<Self, AppError> {
        if let Some(inner) = raw.strip_prefix("[[") {
            let name = inner
                .strip_suffix("]]")
                .and_then(|inner| inner.strip_prefix("..."))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "route segment '{raw}' must have the form '[[...name]]'"
                    ))
                })?;
            return match Self::parse(format!("[...{name}]").as_str())? {
                Self::CatchAll(name) => Ok(Self::OptionalCatchAll(name)),
                _ => Err(AppError::Validation(format!(
                    "route segment '{raw}' must have the form '[[...name]]'"
                ))),
            };
        }

        let Some(inner) = raw.strip_prefix('[') else {
            if raw.contains(['[', ']']) {
                return Err(AppError::Validation(format!(
                    "route segment '{raw}' has a misplaced bracket"
                )));
            }
            return Ok(Self::Literal(raw.to_owned()));
        };

        let Some(inner) = inner.strip_suffix(']') else {
            return Err(AppError::Validation(format!(
                "route placeholder '{raw}' is not closed"
            )));
        };

        let (name, is_catch_all) = match inner.strip_prefix("...") {
            Some(name) => (name, true),
            None => (inner, false),
        };

        let is_valid_name = !name.is_empty()
            && name
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'));
        if !is_valid_name {
            return Err(AppError::Validation(format!(
                "route placeholder '{raw}' has an invalid name"
            )));
        }

        if is_catch_all {
            Ok(Self::CatchAll(name.to_owned()))
        } else {
            Ok(Self::Param(name.to_owned()))
        }
    }
}

impl Display for RouteSegment {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => write!(formatter, "{value}"),
            Self::Param(name) => write!(formatter, "[{name}]"),
            Self::CatchAll(name) => write!(formatter, "[...{name}]"),
            Self::OptionalCatchAll(name) => write!(formatter, "[[...{name}]]"),
        }
    }
}

/// Parsed path template such as `/roles/[id]/edit`, `/admin/[...rest]` or
/// `/docs/[[...page]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    segments: Vec<RouteSegment>,
}

impl RoutePattern {
    /// Parses and validates a route template.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if !raw.starts_with('/') {
            return Err(AppError::Validation(format!(
                "route pattern '{raw}' must start with '/'"
            )));
        }

        let segments = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(RouteSegment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let catch_all_position = segments.iter().position(RouteSegment::is_catch_all);
        if let Some(position) = catch_all_position
            && position + 1 != segments.len()
        {
            return Err(AppError::Validation(format!(
                "route pattern '{raw}' has a catch-all that is not the last segment"
            )));
        }

        Ok(Self { segments })
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[RouteSegment] {
        self.segments.as_slice()
    }

    /// Number of segments, used as the specificity measure.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns whether the pattern has no placeholder at all.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, RouteSegment::Literal(_)))
    }

    /// Tests a request path against this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.matches_segments(path_segments(path).as_slice())
    }

    /// Tests already-split path segments against this pattern.
    #[must_use]
    pub fn matches_segments(&self, path: &[&str]) -> bool {
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                RouteSegment::CatchAll(_) => return path.len() > index,
                RouteSegment::OptionalCatchAll(_) => return true,
                RouteSegment::Param(_) => {
                    if path.get(index).is_none() {
                        return false;
                    }
                }
                RouteSegment::Literal(literal) => {
                    if path.get(index) != Some(&literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        path.len() == self.segments.len()
    }

    /// Returns whether some path could be matched by both patterns.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let length = self.segments.len().max(other.segments.len());
        for index in 0..=length {
            match (self.segments.get(index), other.segments.get(index)) {
                (Some(RouteSegment::OptionalCatchAll(_)), _)
                | (_, Some(RouteSegment::OptionalCatchAll(_))) => return true,
                (Some(RouteSegment::CatchAll(_)), right) => return right.is_some(),
                (left, Some(RouteSegment::CatchAll(_))) => return left.is_some(),
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(RouteSegment::Literal(left)), Some(RouteSegment::Literal(right))) => {
                    if left != right {
                        return false;
                    }
                }
                _ => {}
            }
        }

        true
    }
}

impl FromStr for RoutePattern {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for RoutePattern {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(formatter, "/");
        }

        for segment in &self.segments {
            write!(formatter, "/{segment}")?;
        }

        Ok(())
    }
}

/// Composition of a rule's required permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionMode {
    /// At least one required permission must be held.
    #[default]
    Any,
    /// Every required permission must be held.
    All,
}

/// Permission policy bound to a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pattern: RoutePattern,
    required_permissions: Vec<PermissionId>,
    mode: PermissionMode,
    priority: i32,
}

impl RouteRule {
    /// Creates an `ANY` rule with default priority.
    #[must_use]
    pub fn new(pattern: RoutePattern, required_permissions: Vec<PermissionId>) -> Self {
        Self {
            pattern,
            required_permissions,
            mode: PermissionMode::Any,
            priority: 0,
        }
    }

    /// Sets the composition mode.
    #[must_use]
    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets an explicit precedence; higher priorities are tried first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the route pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Returns the required permissions in declaration order.
    #[must_use]
    pub fn required_permissions(&self) -> &[PermissionId] {
        self.required_permissions.as_slice()
    }

    /// Returns the composition mode.
    #[must_use]
    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Returns the explicit precedence.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Evaluates the rule against the caller's permissions.
    ///
    /// An empty requirement list only demands authentication. Denials list
    /// the permissions that would have satisfied the rule: every missing one
    /// for `ALL`, every required one for `ANY`.
    #[must_use]
    pub fn authorize(&self, granted: &PermissionSet) -> AuthorizationOutcome {
        if self.required_permissions.is_empty() {
            return AuthorizationOutcome::Granted;
        }

        let missing: Vec<PermissionId> = self
            .required_permissions
            .iter()
            .filter(|permission| !granted.contains(permission))
            .cloned()
            .collect();

        let is_authorized = match self.mode {
            PermissionMode::All => missing.is_empty(),
            PermissionMode::Any => missing.len() < self.required_permissions.len(),
        };

        if is_authorized {
            AuthorizationOutcome::Granted
        } else {
            AuthorizationOutcome::Denied { missing }
        }
    }
}

/// Result of evaluating a route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The caller satisfies the rule.
    Granted,
    /// The caller does not satisfy the rule.
    Denied {
        /// Permissions the caller lacks, for internal diagnostics only.
        missing: Vec<PermissionId>,
    },
}

impl AuthorizationOutcome {
    /// Returns whether access is granted.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}
