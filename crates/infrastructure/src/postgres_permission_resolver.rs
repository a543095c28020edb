use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use gatehouse_application::PermissionResolver;
use gatehouse_core::{AppError, AppResult, SubjectId};
use gatehouse_domain::{PermissionId, PermissionSet};

/// Resolves effective permissions through role assignments.
#[derive(Clone)]
pub struct PostgresPermissionResolver {
    pool: PgPool,
}

impl PostgresPermissionResolver {
    /// Creates a resolver with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    permission: String,
}

#[async_trait]
impl PermissionResolver for PostgresPermissionResolver {
    async fn permissions_for(&self, subject_id: SubjectId) -> AppResult<PermissionSet> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT DISTINCT grants.permission
            FROM subject_roles
            INNER JOIN role_permissions AS grants
                ON grants.role_id = subject_roles.role_id
            INNER JOIN subjects
                ON subjects.id = subject_roles.subject_id
            WHERE subject_roles.subject_id = $1
                AND subjects.is_active
            "#,
        )
        .bind(subject_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        rows.into_iter()
            .map(|row| {
                PermissionId::from_str(row.permission.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode permission '{}' for subject '{subject_id}': {error}",
                        row.permission
                    ))
                })
            })
            .collect()
    }
}
