use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use gatehouse_application::{
    ActorActivity, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogPagination,
    AuditLogRepository, AuditStats, NewAuditLogEntry,
};
use gatehouse_core::{AppError, AppResult, CorrelationId, SubjectId};

/// PostgreSQL-backed append-only audit store.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    actor_id: Option<Uuid>,
    action: String,
    module: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    before_state: Option<Value>,
    after_state: Option<Value>,
    source_address: Option<String>,
    client_descriptor: Option<String>,
    correlation_id: Uuid,
    occurred_at: DateTime<Utc>,
    metadata: Value,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            entry: NewAuditLogEntry {
                actor_id: row.actor_id.map(SubjectId::from_uuid),
                action: row.action,
                module: row.module,
                entity_type: row.entity_type,
                entity_id: row.entity_id,
                before_state: row.before_state,
                after_state: row.after_state,
                source_address: row.source_address,
                client_descriptor: row.client_descriptor,
                correlation_id: CorrelationId::from_uuid(row.correlation_id),
                occurred_at: row.occurred_at,
                metadata: row.metadata,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct GroupCountRow {
    label: String,
    count: i64,
}

#[derive(Debug, FromRow)]
struct ActorCountRow {
    actor_id: Uuid,
    count: i64,
}

/// Appends the filter as a conjunctive `WHERE` clause.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditLogFilter) {
    builder.push(" WHERE TRUE");
    if let Some(actor_id) = filter.actor_id {
        builder.push(" AND actor_id = ").push_bind(actor_id.as_uuid());
    }
    if let Some(module) = &filter.module {
        builder.push(" AND module = ").push_bind(module.clone());
    }
    if let Some(action) = &filter.action {
        builder.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(entity_type) = &filter.entity_type {
        builder
            .push(" AND entity_type = ")
            .push_bind(entity_type.clone());
    }
    if let Some(entity_id) = &filter.entity_id {
        builder.push(" AND entity_id = ").push_bind(entity_id.clone());
    }
    if let Some(from) = filter.from {
        builder.push(" AND occurred_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND occurred_at <= ").push_bind(to);
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

impl PostgresAuditLogRepository {
    async fn group_counts(&self, column: &str, filter: &AuditLogFilter) -> AppResult<BTreeMap<String, u64>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {column} AS label, COUNT(*) AS count FROM audit_log_entries"
        ));
        push_filter(&mut builder, filter);
        builder.push(format!(" GROUP BY {column}"));

        let rows = builder
            .build_query_as::<GroupCountRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count audit entries by {column}: {error}"))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| (row.label, count(row.count)))
            .collect())
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn insert(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        let row = sqlx::query_as::<_, AuditLogRow>(
            r#"
            INSERT INTO audit_log_entries (
                actor_id,
                action,
                module,
                entity_type,
                entity_id,
                before_state,
                after_state,
                source_address,
                client_descriptor,
                correlation_id,
                occurred_at,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING
                id,
                actor_id,
                action,
                module,
                entity_type,
                entity_id,
                before_state,
                after_state,
                source_address,
                client_descriptor,
                correlation_id,
                occurred_at,
                metadata
            "#,
        )
        .bind(entry.actor_id.map(|actor_id| actor_id.as_uuid()))
        .bind(entry.action)
        .bind(entry.module)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.before_state)
        .bind(entry.after_state)
        .bind(entry.source_address)
        .bind(entry.client_descriptor)
        .bind(entry.correlation_id.as_uuid())
        .bind(entry.occurred_at)
        .bind(entry.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(row.into())
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        pagination: AuditLogPagination,
    ) -> AppResult<AuditLogPage> {
        let mut total_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log_entries");
        push_filter(&mut total_query, filter);
        let total = total_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count audit entries: {error}")))?;

        let mut page_query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                id,
                actor_id,
                action,
                module,
                entity_type,
                entity_id,
                before_state,
                after_state,
                source_address,
                client_descriptor,
                correlation_id,
                occurred_at,
                metadata
            FROM audit_log_entries
            "#,
        );
        push_filter(&mut page_query, filter);
        page_query
            .push(" ORDER BY occurred_at DESC, id DESC LIMIT ")
            .push_bind(pagination.limit as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset as i64);

        let rows = page_query
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        Ok(AuditLogPage::new(
            rows.into_iter().map(AuditLogEntry::from).collect(),
            count(total),
            pagination,
        ))
    }

    async fn aggregate(&self, filter: &AuditLogFilter, top_actors: usize) -> AppResult<AuditStats> {
        let mut total_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log_entries");
        push_filter(&mut total_query, filter);
        let total = total_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count audit entries: {error}")))?;

        let count_by_action = self.group_counts("action", filter).await?;
        let count_by_module = self.group_counts("module", filter).await?;

        let mut actor_query = QueryBuilder::<Postgres>::new(
            "SELECT actor_id, COUNT(*) AS count FROM audit_log_entries",
        );
        push_filter(&mut actor_query, filter);
        actor_query
            .push(" AND actor_id IS NOT NULL GROUP BY actor_id ORDER BY count DESC, actor_id LIMIT ")
            .push_bind(top_actors as i64);
        let actors = actor_query
            .build_query_as::<ActorCountRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to rank audit actors: {error}")))?;

        Ok(AuditStats {
            total_count: count(total),
            count_by_action,
            count_by_module,
            top_actors: actors
                .into_iter()
                .map(|row| ActorActivity {
                    actor_id: SubjectId::from_uuid(row.actor_id),
                    count: count(row.count),
                })
                .collect(),
        })
    }
}
