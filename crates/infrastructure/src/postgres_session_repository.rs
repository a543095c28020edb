//! PostgreSQL-backed session store.
//!
//! Records are keyed by the SHA-256 hash of the session token so a leaked
//! table cannot be replayed as live sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use gatehouse_application::SessionRepository;
use gatehouse_core::{AppError, AppResult, SubjectId};
use gatehouse_domain::{SessionRecord, SessionToken};

/// PostgreSQL implementation of the session repository port.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    subject_id: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    source_address: Option<String>,
    client_descriptor: Option<String>,
}

/// Computes the SHA-256 hash of a session token for storage.
pub(crate) fn hash_token(token: &SessionToken) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let digest = Sha256::digest(token.as_str().as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(&self, record: SessionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                token_hash,
                subject_id,
                expires_at,
                created_at,
                source_address,
                client_descriptor
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(hash_token(&record.token))
        .bind(record.subject_id.as_uuid())
        .bind(record.expires_at)
        .bind(record.created_at)
        .bind(record.source_address)
        .bind(record.client_descriptor)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to create session: {error}")))?;

        Ok(())
    }

    async fn find_by_token(&self, token: &SessionToken) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT subject_id, expires_at, created_at, source_address, client_descriptor
            FROM auth_sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to load session: {error}")))?;

        Ok(row.map(|row| SessionRecord {
            token: token.clone(),
            subject_id: SubjectId::from_uuid(row.subject_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
            source_address: row.source_address,
            client_descriptor: row.client_descriptor,
        }))
    }

    async fn delete_by_token(&self, token: &SessionToken) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_subject(&self, subject_id: SubjectId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE subject_id = $1")
            .bind(subject_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete subject sessions: {error}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete expired sessions: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}
