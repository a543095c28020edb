use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use gatehouse_application::{AccessAdminRepository, CreateRoleInput, RoleRecord, UpdateRoleInput};
use gatehouse_core::{AppError, AppResult, SubjectId};
use gatehouse_domain::PermissionId;

/// PostgreSQL-backed repository for role administration.
#[derive(Clone)]
pub struct PostgresAccessAdminRepository {
    pool: PgPool,
}

impl PostgresAccessAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: Uuid,
    role_name: String,
    description: Option<String>,
    permission: Option<String>,
}

const ROLE_SELECT: &str = r#"
    SELECT
        roles.id AS role_id,
        roles.name AS role_name,
        roles.description,
        grants.permission
    FROM roles
    LEFT JOIN role_permissions AS grants
        ON grants.role_id = roles.id
"#;

#[async_trait]
impl AccessAdminRepository for PostgresAccessAdminRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleRecord>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "{ROLE_SELECT} ORDER BY roles.name, grants.permission"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn find_role(&self, role_id: Uuid) -> AppResult<Option<RoleRecord>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "{ROLE_SELECT} WHERE roles.id = $1 ORDER BY grants.permission"
        ))
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord> {
        let mut transaction = self.begin().await?;

        let role_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(input.name.as_str())
        .bind(input.description.as_deref())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, input.name.as_str(), "create"))?;

        for permission in &input.permissions {
            insert_grant(&mut transaction, role_id, permission).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        let mut permissions = input.permissions;
        permissions.sort();
        permissions.dedup();
        Ok(RoleRecord {
            role_id,
            name: input.name,
            description: input.description,
            permissions,
        })
    }

    async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<bool> {
        let result = sqlx::query("UPDATE roles SET name = $2, description = $3 WHERE id = $1")
            .bind(role_id)
            .bind(input.name.as_str())
            .bind(input.description.as_deref())
            .execute(&self.pool)
            .await
            .map_err(|error| map_role_conflict(error, input.name.as_str(), "update"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_role(&self, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn grant_permission(&self, role_id: Uuid, permission: &PermissionId) -> AppResult<bool> {
        let mut transaction = self.begin().await?;
        let changed = insert_grant(&mut transaction, role_id, permission).await?;
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(changed)
    }

    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission: &PermissionId,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission = $2")
                .bind(role_id)
                .bind(permission.to_string())
                .execute(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to revoke permission: {error}"))
                })?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO subject_roles (subject_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (subject_id, role_id) DO NOTHING
            "#,
        )
        .bind(subject_id.as_uuid())
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|error| map_missing_reference(error, "failed to assign role"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn unassign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM subject_roles WHERE subject_id = $1 AND role_id = $2")
            .bind(subject_id.as_uuid())
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to remove role assignment: {error}"))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_grant(
    transaction: &mut Transaction<'static, Postgres>,
    role_id: Uuid,
    permission: &PermissionId,
) -> AppResult<bool> {
    sqlx::query(
        r#"
        INSERT INTO permissions (name, module, action)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(permission.to_string())
    .bind(permission.module())
    .bind(permission.action())
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Internal(format!("failed to register permission: {error}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission)
        VALUES ($1, $2)
        ON CONFLICT (role_id, permission) DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(permission.to_string())
    .execute(&mut **transaction)
    .await
    .map_err(|error| map_missing_reference(error, "failed to grant permission"))?;

    Ok(result.rows_affected() > 0)
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<RoleRecord>> {
    let mut order = Vec::new();
    let mut by_id: HashMap<Uuid, RoleRecord> = HashMap::new();

    for row in rows {
        let role = by_id.entry(row.role_id).or_insert_with(|| {
            order.push(row.role_id);
            RoleRecord {
                role_id: row.role_id,
                name: row.role_name.clone(),
                description: row.description.clone(),
                permissions: Vec::new(),
            }
        });

        if let Some(permission_value) = row.permission {
            let permission = PermissionId::from_str(permission_value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission '{permission_value}' for role '{}': {error}",
                    row.role_id
                ))
            })?;
            role.permissions.push(permission);
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|role_id| by_id.remove(&role_id))
        .collect())
}

fn map_role_conflict(error: sqlx::Error, role_name: &str, operation: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to {operation} role: {error}"))
}

fn map_missing_reference(error: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound(format!("{context}: referenced subject or role does not exist"));
    }

    AppError::Internal(format!("{context}: {error}"))
}
