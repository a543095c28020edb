use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use gatehouse_core::{AppError, AppResult, CorrelationId, SubjectId};

/// Upper bound for one audit page.
pub const MAX_AUDIT_PAGE_SIZE: usize = 200;

/// Default audit page size.
pub const DEFAULT_AUDIT_PAGE_SIZE: usize = 50;

/// Deepest offset served by the audit listing.
pub const MAX_AUDIT_OFFSET: usize = 100_000;

/// Audit row before persistence assigns its identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAuditLogEntry {
    /// Acting subject, `None` for system actions.
    pub actor_id: Option<SubjectId>,
    /// Stable action identifier.
    pub action: String,
    /// Application module.
    pub module: String,
    /// Affected entity type.
    pub entity_type: Option<String>,
    /// Affected entity identifier.
    pub entity_id: Option<String>,
    /// Snapshot before the action.
    pub before_state: Option<Value>,
    /// Snapshot after the action.
    pub after_state: Option<Value>,
    /// Caller address.
    pub source_address: Option<String>,
    /// Caller user-agent.
    pub client_descriptor: Option<String>,
    /// Request correlation identifier.
    pub correlation_id: CorrelationId,
    /// Occurrence time.
    pub occurred_at: DateTime<Utc>,
    /// Free-form details.
    pub metadata: Value,
}

/// Persisted, append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    /// Stable row identifier.
    pub id: Uuid,
    /// Persisted fields.
    #[serde(flatten)]
    pub entry: NewAuditLogEntry,
}

/// Audit query filter. All fields are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    /// Acting subject.
    pub actor_id: Option<SubjectId>,
    /// Application module.
    pub module: Option<String>,
    /// Action identifier.
    pub action: Option<String>,
    /// Entity type.
    pub entity_type: Option<String>,
    /// Entity identifier.
    pub entity_id: Option<String>,
    /// Inclusive lower time bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub to: Option<DateTime<Utc>>,
}

impl AuditLogFilter {
    /// Rejects inverted time ranges.
    pub fn validate(&self) -> AppResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AppError::Validation(
                "audit time range start must not be after its end".to_owned(),
            ));
        }

        Ok(())
    }

    /// Returns whether an entry satisfies the filter.
    #[must_use]
    pub fn matches(&self, entry: &NewAuditLogEntry) -> bool {
        self.actor_id.is_none_or(|actor_id| entry.actor_id == Some(actor_id))
            && matches_text(self.module.as_deref(), Some(entry.module.as_str()))
            && matches_text(self.action.as_deref(), Some(entry.action.as_str()))
            && matches_text(self.entity_type.as_deref(), entry.entity_type.as_deref())
            && matches_text(self.entity_id.as_deref(), entry.entity_id.as_deref())
            && self.from.is_none_or(|from| entry.occurred_at >= from)
            && self.to.is_none_or(|to| entry.occurred_at <= to)
    }
}

fn matches_text(expected: Option<&str>, actual: Option<&str>) -> bool {
    expected.is_none_or(|expected| actual == Some(expected))
}

/// Offset pagination for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLogPagination {
    /// Maximum rows returned, clamped to `1..=MAX_AUDIT_PAGE_SIZE`.
    pub limit: usize,
    /// Rows skipped, at most `MAX_AUDIT_OFFSET`.
    pub offset: usize,
}

impl AuditLogPagination {
    /// Creates a pagination window with a clamped limit and offset.
    ///
    /// Adapters and responses read the clamped values, so a page is never
    /// labelled with an offset other than the one it was fetched at.
    #[must_use]
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: limit.clamp(1, MAX_AUDIT_PAGE_SIZE),
            offset: offset.min(MAX_AUDIT_OFFSET),
        }
    }
}

impl Default for AuditLogPagination {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_PAGE_SIZE, 0)
    }
}

/// One page of audit rows, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogPage {
    /// Rows on this page.
    pub entries: Vec<AuditLogEntry>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    /// Whether rows remain after this page.
    pub has_more: bool,
}

impl AuditLogPage {
    /// Builds a page and derives `has_more` from the window.
    #[must_use]
    pub fn new(entries: Vec<AuditLogEntry>, total: u64, pagination: AuditLogPagination) -> Self {
        let seen = pagination.offset.saturating_add(entries.len()) as u64;
        Self {
            has_more: seen < total,
            entries,
            total,
        }
    }
}

/// Activity count for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorActivity {
    /// Acting subject.
    pub actor_id: SubjectId,
    /// Matching rows for the actor.
    pub count: u64,
}

/// Aggregate view over matching audit rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Matching rows.
    pub total_count: u64,
    /// Row counts per action.
    pub count_by_action: BTreeMap<String, u64>,
    /// Row counts per module.
    pub count_by_module: BTreeMap<String, u64>,
    /// Most active actors, busiest first.
    pub top_actors: Vec<ActorActivity>,
}

/// Port for the external audit store.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one row.
    async fn insert(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry>;

    /// Returns one page of matching rows, newest first.
    async fn query(
        &self,
        filter: &AuditLogFilter,
        pagination: AuditLogPagination,
    ) -> AppResult<AuditLogPage>;

    /// Aggregates matching rows.
    async fn aggregate(&self, filter: &AuditLogFilter, top_actors: usize) -> AppResult<AuditStats>;
}
