use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gatehouse_application::{
    AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogPagination, AuditStats,
    DEFAULT_AUDIT_PAGE_SIZE,
};
use gatehouse_core::SubjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

/// Query string accepted by the audit listing and statistics endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor_id: Option<Uuid>,
    pub module: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditLogQuery {
    pub fn filter(&self) -> AuditLogFilter {
        AuditLogFilter {
            actor_id: self.actor_id.map(SubjectId::from_uuid),
            module: non_blank(self.module.as_deref()),
            action: non_blank(self.action.as_deref()),
            entity_type: non_blank(self.entity_type.as_deref()),
            entity_id: non_blank(self.entity_id.as_deref()),
            from: self.from,
            to: self.to,
        }
    }

    pub fn pagination(&self) -> AuditLogPagination {
        AuditLogPagination::new(
            self.limit.unwrap_or(DEFAULT_AUDIT_PAGE_SIZE),
            self.offset.unwrap_or(0),
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// API representation of one audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub id: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub module: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    #[ts(type = "unknown")]
    pub before_state: Option<Value>,
    #[ts(type = "unknown")]
    pub after_state: Option<Value>,
    pub source_address: Option<String>,
    pub client_descriptor: Option<String>,
    pub correlation_id: String,
    pub occurred_at: String,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Value,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        let entry = value.entry;
        Self {
            id: value.id.to_string(),
            actor_id: entry.actor_id.map(|actor_id| actor_id.to_string()),
            action: entry.action,
            module: entry.module,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            before_state: entry.before_state,
            after_state: entry.after_state,
            source_address: entry.source_address,
            client_descriptor: entry.client_descriptor,
            correlation_id: entry.correlation_id.to_string(),
            occurred_at: entry.occurred_at.to_rfc3339(),
            metadata: entry.metadata,
        }
    }
}

/// One page of audit entries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-log-page-response.ts"
)]
pub struct AuditLogPageResponse {
    pub entries: Vec<AuditLogEntryResponse>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl AuditLogPageResponse {
    pub fn new(page: AuditLogPage, pagination: AuditLogPagination) -> Self {
        Self {
            entries: page
                .entries
                .into_iter()
                .map(AuditLogEntryResponse::from)
                .collect(),
            total: page.total,
            limit: pagination.limit,
            offset: pagination.offset,
            has_more: page.has_more,
        }
    }
}

/// Audit activity of one actor.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/actor-activity-response.ts"
)]
pub struct ActorActivityResponse {
    pub actor_id: String,
    pub count: u64,
}

/// Aggregated audit statistics.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/audit-stats-response.ts"
)]
pub struct AuditStatsResponse {
    pub total_count: u64,
    pub count_by_action: BTreeMap<String, u64>,
    pub count_by_module: BTreeMap<String, u64>,
    pub top_actors: Vec<ActorActivityResponse>,
}

impl From<AuditStats> for AuditStatsResponse {
    fn from(value: AuditStats) -> Self {
        Self {
            total_count: value.total_count,
            count_by_action: value.count_by_action,
            count_by_module: value.count_by_module,
            top_actors: value
                .top_actors
                .into_iter()
                .map(|actor| ActorActivityResponse {
                    actor_id: actor.actor_id.to_string(),
                    count: actor.count,
                })
                .collect(),
        }
    }
}
