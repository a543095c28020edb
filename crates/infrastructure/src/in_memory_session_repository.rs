use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gatehouse_application::SessionRepository;
use gatehouse_core::{AppResult, SubjectId};
use gatehouse_domain::{SessionRecord, SessionToken};

/// Process-local session store for tests and single-node development.
#[derive(Default)]
pub struct InMemorySessionRepository {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, record: SessionRecord) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert(record.token.as_str().to_owned(), record);
        Ok(())
    }

    async fn find_by_token(&self, token: &SessionToken) -> AppResult<Option<SessionRecord>> {
        Ok(self.records.read().await.get(token.as_str()).cloned())
    }

    async fn delete_by_token(&self, token: &SessionToken) -> AppResult<bool> {
        Ok(self.records.write().await.remove(token.as_str()).is_some())
    }

    async fn delete_by_subject(&self, subject_id: SubjectId) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.subject_id != subject_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}
