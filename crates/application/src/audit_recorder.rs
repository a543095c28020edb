//! Persists one audit row per dispatched domain event.
//!
//! Audit writes are best effort: a failed write is logged and dropped so the
//! business operation that raised the event still succeeds.

mod projection;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use gatehouse_core::AppResult;
use gatehouse_domain::{Event, EventKind};

use crate::{
    AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogPagination, AuditLogRepository,
    AuditStats, EventBus, EventListener, NewAuditLogEntry, SubscriptionHandle,
};

pub use projection::project_event;

/// Number of actors reported by `get_stats`.
pub const TOP_ACTOR_LIMIT: usize = 10;

/// Audit trail writer and query facade.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditRecorder {
    /// Creates a recorder over an audit store.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    /// Subscribes the recorder once per audited event kind.
    pub fn register(&self, bus: &EventBus) -> Vec<SubscriptionHandle> {
        let listener: Arc<dyn EventListener> = Arc::new(self.clone());
        EventKind::all()
            .iter()
            .map(|kind| bus.subscribe(*kind, Arc::clone(&listener)))
            .collect()
    }

    /// Appends an entry directly, bypassing the bus.
    ///
    /// Returns `None` when the store rejected the write; the failure is logged.
    pub async fn log(&self, entry: NewAuditLogEntry) -> Option<AuditLogEntry> {
        let action = entry.action.clone();
        let correlation_id = entry.correlation_id;
        match self.repository.insert(entry).await {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(
                    action = %action,
                    correlation_id = %correlation_id,
                    error = %error,
                    "audit write failed"
                );
                None
            }
        }
    }

    /// Lists matching entries, newest first.
    pub async fn get_logs(
        &self,
        filter: &AuditLogFilter,
        pagination: AuditLogPagination,
    ) -> AppResult<AuditLogPage> {
        filter.validate()?;
        self.repository.query(filter, pagination).await
    }

    /// Aggregates matching entries.
    pub async fn get_stats(&self, filter: &AuditLogFilter) -> AppResult<AuditStats> {
        filter.validate()?;
        self.repository.aggregate(filter, TOP_ACTOR_LIMIT).await
    }
}

#[async_trait]
impl EventListener for AuditRecorder {
    fn name(&self) -> &str {
        "audit_recorder"
    }

    async fn handle(&self, event: &Event) -> AppResult<()> {
        self.log(project_event(event)).await;
        Ok(())
    }
}
