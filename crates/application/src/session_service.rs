//! Hybrid session validation and session lifecycle.
//!
//! A request is authenticated by a signed stateless token. Strict validation
//! additionally looks up the server-side session record linked through the
//! token's `sid` claim, which is what makes administrative revocation take
//! effect before the stateless token expires.
//!
//! Operators choosing which routes are strict should keep the asymmetry in
//! mind: deleting a session record blocks strict routes immediately, while
//! non-strict routes stay reachable until the stateless token expires.

mod token_crypto;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, warn};

use gatehouse_core::{AppResult, AuthenticatedSubject, SubjectId};
use gatehouse_domain::{SessionRecord, SessionToken};

use crate::{
    RequestContext, SessionRepository, SessionTokenClaims, SessionTokenCodec, TokenRejection,
};

use self::token_crypto::generate_session_token;

/// Session lifetime and lookup bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime shared by the stateless token and the session record.
    pub max_age: chrono::Duration,
    /// Upper bound for one strict-mode store lookup.
    pub lookup_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::hours(24),
            lookup_timeout: Duration::from_millis(1_500),
        }
    }
}

/// Whether the server-side record must be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationMode {
    /// Checks the session record in addition to the stateless token.
    pub strict: bool,
}

impl ValidationMode {
    /// Stateless token check only.
    pub const LENIENT: Self = Self { strict: false };
    /// Stateless token plus session record check.
    pub const STRICT: Self = Self { strict: true };
}

/// Failure taxonomy of session validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionValidationError {
    /// No usable stateless token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(TokenRejection),
    /// Valid stateless token whose session record is gone or expired.
    #[error("session revoked")]
    SessionRevoked,
    /// The session store could not be consulted.
    #[error("session validation unavailable: {0}")]
    ValidationUnavailable(String),
}

/// Result of a successful session creation.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Signed stateless token handed to the client.
    pub stamp: String,
    /// Session record key embedded in the stamp.
    pub token: SessionToken,
    /// Authenticated principal.
    pub subject_id: SubjectId,
    /// Shared expiry of token and record.
    pub expires_at: chrono::DateTime<Utc>,
    /// `false` when the record could not be written; such a session cannot
    /// be revoked server-side until the next login.
    pub revocable: bool,
}

/// Application service owning the session model.
#[derive(Clone)]
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    codec: Arc<dyn SessionTokenCodec>,
    config: SessionConfig,
}

impl SessionService {
    /// Creates a session service from its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        codec: Arc<dyn SessionTokenCodec>,
        config: SessionConfig,
    ) -> Self {
        Self {
            repository,
            codec,
            config,
        }
    }

    /// Returns the configured lifetime and bounds.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Validates a stateless token, optionally re-checking the session record.
    pub async fn validate(
        &self,
        stamp: &str,
        mode: ValidationMode,
    ) -> Result<AuthenticatedSubject, SessionValidationError> {
        let claims = self
            .codec
            .verify(stamp)
            .map_err(SessionValidationError::Unauthenticated)?;

        if !mode.strict {
            return Ok(AuthenticatedSubject::new(
                claims.subject_id,
                claims.session_token,
            ));
        }

        let token = SessionToken::new(claims.session_token.as_str())
            .map_err(|_| SessionValidationError::Unauthenticated(TokenRejection::Malformed))?;

        let lookup =
            tokio::time::timeout(self.config.lookup_timeout, self.repository.find_by_token(&token))
                .await;

        let record = match lookup {
            Err(_) => {
                error!(
                    subject_id = %claims.subject_id,
                    timeout_ms = self.config.lookup_timeout.as_millis(),
                    "session lookup timed out"
                );
                return Err(SessionValidationError::ValidationUnavailable(format!(
                    "session lookup exceeded {}ms",
                    self.config.lookup_timeout.as_millis()
                )));
            }
            Ok(Err(lookup_error)) => {
                error!(
                    subject_id = %claims.subject_id,
                    error = %lookup_error,
                    "session lookup failed"
                );
                return Err(SessionValidationError::ValidationUnavailable(
                    lookup_error.to_string(),
                ));
            }
            Ok(Ok(record)) => record,
        };

        let Some(record) = record else {
            debug!(subject_id = %claims.subject_id, "session record missing");
            return Err(SessionValidationError::SessionRevoked);
        };

        if record.is_expired_at(Utc::now()) {
            debug!(subject_id = %claims.subject_id, "session record expired");
            return Err(SessionValidationError::SessionRevoked);
        }

        if record.subject_id != claims.subject_id {
            warn!(
                claimed_subject_id = %claims.subject_id,
                recorded_subject_id = %record.subject_id,
                "session record belongs to another subject"
            );
            return Err(SessionValidationError::SessionRevoked);
        }

        Ok(AuthenticatedSubject::new(
            claims.subject_id,
            claims.session_token,
        ))
    }

    /// Issues a stateless token backed by a fresh session record.
    ///
    /// Writing the record is best-effort: on failure the login still
    /// succeeds, the session is reported as not revocable and the
    /// degradation is logged.
    pub async fn create_session(
        &self,
        subject_id: SubjectId,
        context: &RequestContext,
    ) -> AppResult<IssuedSession> {
        let token = generate_session_token()?;
        let created_at = Utc::now();
        let expires_at = created_at + self.config.max_age;

        let record = SessionRecord {
            token: token.clone(),
            subject_id,
            expires_at,
            created_at,
            source_address: context.source_address.clone(),
            client_descriptor: context.client_descriptor.clone(),
        };

        let revocable = match self.repository.create(record).await {
            Ok(()) => true,
            Err(create_error) => {
                warn!(
                    subject_id = %subject_id,
                    correlation_id = %context.correlation_id,
                    error = %create_error,
                    "session record not persisted; session cannot be revoked server-side"
                );
                false
            }
        };

        let stamp = self.codec.issue(&SessionTokenClaims {
            subject_id,
            session_token: token.as_str().to_owned(),
            issued_at: created_at,
            expires_at,
        })?;

        Ok(IssuedSession {
            stamp,
            token,
            subject_id,
            expires_at,
            revocable,
        })
    }

    /// Deletes one session record; strict routes reject the token immediately.
    pub async fn terminate_session(&self, token: &SessionToken) -> AppResult<bool> {
        self.repository.delete_by_token(token).await
    }

    /// Deletes every session record of a subject.
    pub async fn terminate_subject_sessions(&self, subject_id: SubjectId) -> AppResult<u64> {
        self.repository.delete_by_subject(subject_id).await
    }

    /// Removes expired session records.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        self.repository.delete_expired(Utc::now()).await
    }
}
