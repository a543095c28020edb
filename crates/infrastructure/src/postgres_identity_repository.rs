use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use gatehouse_application::{IdentityRecord, IdentityRepository};
use gatehouse_core::{AppError, AppResult, SubjectId};

/// PostgreSQL-backed identity lookup.
#[derive(Clone)]
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct IdentityRow {
    id: Uuid,
    login: String,
    display_name: String,
    is_active: bool,
}

impl From<IdentityRow> for IdentityRecord {
    fn from(row: IdentityRow) -> Self {
        Self {
            subject_id: SubjectId::from_uuid(row.id),
            login: row.login,
            display_name: row.display_name,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn find_by_subject_id(&self, subject_id: SubjectId) -> AppResult<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, login, display_name, is_active FROM subjects WHERE id = $1",
        )
        .bind(subject_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load subject: {error}")))?;

        Ok(row.map(IdentityRecord::from))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, login, display_name, is_active FROM subjects WHERE lower(login) = lower($1)",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find subject by login: {error}")))?;

        Ok(row.map(IdentityRecord::from))
    }

    async fn find_credential(&self, subject_id: SubjectId) -> AppResult<Option<String>> {
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM subjects WHERE id = $1",
        )
        .bind(subject_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load credential: {error}")))?;

        Ok(hash.flatten())
    }
}
