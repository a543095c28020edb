//! TTL cache in front of a permission resolver.
//!
//! Role and grant mutations published on the event bus evict affected
//! entries, so the TTL only bounds staleness for changes made by other
//! processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use gatehouse_application::{EventBus, EventListener, PermissionResolver, SubscriptionHandle};
use gatehouse_core::{AppResult, SubjectId};
use gatehouse_domain::{Event, EventKind, EventPayload, PermissionSet};

#[derive(Debug, Clone)]
struct CachedPermissions {
    permissions: PermissionSet,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<SubjectId, CachedPermissions>,
    // Bumped by every invalidation; a fetch started under an older
    // generation must not be cached.
    generation: u64,
}

/// Permission resolver caching results per subject.
pub struct CachedPermissionResolver {
    inner: Arc<dyn PermissionResolver>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl CachedPermissionResolver {
    /// Wraps a resolver; a zero TTL disables caching.
    #[must_use]
    pub fn new(inner: Arc<dyn PermissionResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Drops the cached permissions of one subject.
    pub async fn invalidate(&self, subject_id: SubjectId) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.entries.remove(&subject_id);
    }

    /// Drops every cached entry.
    pub async fn invalidate_all(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.entries.clear();
    }
}

#[async_trait]
impl PermissionResolver for CachedPermissionResolver {
    async fn permissions_for(&self, subject_id: SubjectId) -> AppResult<PermissionSet> {
        if self.ttl.is_zero() {
            return self.inner.permissions_for(subject_id).await;
        }

        let generation = {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(&subject_id)
                && entry.expires_at > Instant::now()
            {
                return Ok(entry.permissions.clone());
            }
            state.generation
        };

        let permissions = self.inner.permissions_for(subject_id).await?;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(subject_id = %subject_id, "skipping cache fill raced by invalidation");
            return Ok(permissions);
        }

        let now = Instant::now();
        state.entries.retain(|_, entry| entry.expires_at > now);
        state.entries.insert(
            subject_id,
            CachedPermissions {
                permissions: permissions.clone(),
                expires_at: now + self.ttl,
            },
        );

        Ok(permissions)
    }
}

/// Event listener evicting cache entries made stale by access mutations.
pub struct PermissionCacheInvalidator {
    cache: Arc<CachedPermissionResolver>,
}

impl PermissionCacheInvalidator {
    /// Creates an invalidator for a cache.
    #[must_use]
    pub fn new(cache: Arc<CachedPermissionResolver>) -> Self {
        Self { cache }
    }

    /// Subscribes to every kind that changes effective permissions.
    pub fn register(self, bus: &EventBus) -> Vec<SubscriptionHandle> {
        let listener: Arc<dyn EventListener> = Arc::new(self);
        [
            EventKind::RoleDeleted,
            EventKind::PermissionGranted,
            EventKind::PermissionRevoked,
            EventKind::RoleAssigned,
            EventKind::RoleUnassigned,
        ]
        .into_iter()
        .map(|kind| bus.subscribe(kind, Arc::clone(&listener)))
        .collect()
    }
}

#[async_trait]
impl EventListener for PermissionCacheInvalidator {
    fn name(&self) -> &str {
        "permission_cache_invalidator"
    }

    async fn handle(&self, event: &Event) -> AppResult<()> {
        match event.payload() {
            EventPayload::RoleAssignment(assignment) => {
                debug!(subject_id = %assignment.subject_id, "evicting cached permissions");
                self.cache.invalidate(assignment.subject_id).await;
            }
            _ => {
                debug!(kind = event.kind().as_str(), "evicting all cached permissions");
                self.cache.invalidate_all().await;
            }
        }

        Ok(())
    }
}
