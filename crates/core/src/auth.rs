use serde::{Deserialize, Serialize};

use crate::SubjectId;

/// Caller identity established by a successful session validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSubject {
    subject_id: SubjectId,
    session_token: String,
}

impl AuthenticatedSubject {
    /// Creates an authenticated subject from validated token claims.
    #[must_use]
    pub fn new(subject_id: SubjectId, session_token: impl Into<String>) -> Self {
        Self {
            subject_id,
            session_token: session_token.into(),
        }
    }

    /// Returns the authenticated principal.
    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    /// Returns the opaque session token linked to the stateless token.
    #[must_use]
    pub fn session_token(&self) -> &str {
        self.session_token.as_str()
    }
}
