use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use gatehouse_core::{AppResult, SubjectId};
use gatehouse_domain::{SessionRecord, SessionToken};

/// Repository port for server-side session records.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a freshly issued session record.
    async fn create(&self, record: SessionRecord) -> AppResult<()>;

    /// Finds a session record by its token.
    async fn find_by_token(&self, token: &SessionToken) -> AppResult<Option<SessionRecord>>;

    /// Deletes one session record; returns whether a record existed.
    async fn delete_by_token(&self, token: &SessionToken) -> AppResult<bool>;

    /// Deletes every session record of a subject; returns the number removed.
    async fn delete_by_subject(&self, subject_id: SubjectId) -> AppResult<u64>;

    /// Deletes records expired at `now`; returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Claims carried by the signed stateless token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokenClaims {
    /// Authenticated principal.
    pub subject_id: SubjectId,
    /// Linkage to the server-side session record.
    pub session_token: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry of the stateless token itself.
    pub expires_at: DateTime<Utc>,
}

/// Why a stateless token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// The token could not be decoded or misses required claims.
    #[error("malformed token")]
    Malformed,
    /// The signature or issuer did not verify.
    #[error("bad token signature")]
    BadSignature,
    /// The token's expiry lies in the past.
    #[error("token expired")]
    Expired,
}

/// Port for signing and verifying stateless session tokens.
pub trait SessionTokenCodec: Send + Sync {
    /// Signs claims into a compact token.
    fn issue(&self, claims: &SessionTokenClaims) -> AppResult<String>;

    /// Verifies signature and expiry and returns the claims.
    fn verify(&self, stamp: &str) -> Result<SessionTokenClaims, TokenRejection>;
}
