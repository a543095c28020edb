use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};
use gatehouse_core::{AppError, SubjectId};

/// Opaque session identifier embedded in the stateless token.
///
/// `Debug` output is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps an existing token value.
    pub fn new(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "session token must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for SessionToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SessionToken(**redacted**)")
    }
}

/// Server-side, revocable session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Unique opaque token; the store key.
    pub token: SessionToken,
    /// Authenticated principal.
    pub subject_id: SubjectId,
    /// Absolute expiry; the record is invalid once passed.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Caller address at login, forensic only.
    pub source_address: Option<String>,
    /// Caller user-agent at login, forensic only.
    pub client_descriptor: Option<String>,
}

impl SessionRecord {
    /// Returns whether the record is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
