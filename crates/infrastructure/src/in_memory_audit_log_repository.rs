use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use gatehouse_application::{
    ActorActivity, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogPagination,
    AuditLogRepository, AuditStats, NewAuditLogEntry,
};
use gatehouse_core::{AppResult, SubjectId};

/// Process-local audit store for tests and single-node development.
#[derive(Default)]
pub struct InMemoryAuditLogRepository {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLogRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, filter: &AuditLogFilter) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| filter.matches(&entry.entry))
            .cloned()
            .collect();
        // Newest first; later inserts win timestamp ties.
        entries.reverse();
        entries.sort_by(|left, right| right.entry.occurred_at.cmp(&left.entry.occurred_at));
        entries
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn insert(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            entry,
        };
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        pagination: AuditLogPagination,
    ) -> AppResult<AuditLogPage> {
        let entries = self.matching(filter).await;
        let total = entries.len() as u64;
        let page = entries
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect();

        Ok(AuditLogPage::new(page, total, pagination))
    }

    async fn aggregate(&self, filter: &AuditLogFilter, top_actors: usize) -> AppResult<AuditStats> {
        let mut stats = AuditStats::default();
        let mut actors: HashMap<SubjectId, u64> = HashMap::new();

        for entry in self.matching(filter).await {
            let entry = entry.entry;
            stats.total_count += 1;
            *stats.count_by_action.entry(entry.action).or_default() += 1;
            *stats.count_by_module.entry(entry.module).or_default() += 1;
            if let Some(actor_id) = entry.actor_id {
                *actors.entry(actor_id).or_default() += 1;
            }
        }

        let mut ranked: Vec<ActorActivity> = actors
            .into_iter()
            .map(|(actor_id, count)| ActorActivity { actor_id, count })
            .collect();
        ranked.sort_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| left.actor_id.cmp(&right.actor_id))
        });
        ranked.truncate(top_actors);
        stats.top_actors = ranked;

        Ok(stats)
    }
}
