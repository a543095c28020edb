//! In-process publish/subscribe for domain events.
//!
//! A bus is an explicitly constructed value; clones share one listener
//! registry. `dispatch` runs every kind-specific listener concurrently,
//! waits for all of them, then does the same for wildcard listeners.
//! A listener that fails or panics is logged and never affects its siblings
//! or the publisher. No timeout is imposed: a slow listener slows the
//! publisher down.

mod listeners;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use gatehouse_core::AppResult;
use gatehouse_domain::{Event, EventKind, EventMetadata, EventPayload};

pub use listeners::TracingEventListener;

/// Consumer of dispatched events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Stable listener name used in logs.
    fn name(&self) -> &str;

    /// Handles one event. Errors are logged by the bus and go no further.
    async fn handle(&self, event: &Event) -> AppResult<()>;
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    kind: Option<EventKind>,
}

impl SubscriptionHandle {
    /// Returns the subscribed kind, `None` for wildcard subscriptions.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.kind
    }
}

/// Delivery outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Identifier of the dispatched event.
    pub event_id: Uuid,
    /// Listener invocations that completed successfully.
    pub delivered: usize,
    /// Listener invocations that returned an error or panicked.
    pub failed: usize,
}

type Registration = (u64, Arc<dyn EventListener>);

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<Registration>>,
    wildcard: Vec<Registration>,
}

/// Event bus shared by publishers and subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl EventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for one event kind.
    pub fn subscribe(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> SubscriptionHandle {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.by_kind.entry(kind).or_default().push((id, listener));

        SubscriptionHandle {
            id,
            kind: Some(kind),
        }
    }

    /// Registers a listener receiving every event kind.
    pub fn subscribe_all(&self, listener: Arc<dyn EventListener>) -> SubscriptionHandle {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.wildcard.push((id, listener));

        SubscriptionHandle { id, kind: None }
    }

    /// Removes a subscription; returns whether it was still registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let registrations = match handle.kind {
            Some(kind) => match registry.by_kind.get_mut(&kind) {
                Some(registrations) => registrations,
                None => return false,
            },
            None => &mut registry.wildcard,
        };

        let before = registrations.len();
        registrations.retain(|(id, _)| *id != handle.id);
        before != registrations.len()
    }

    /// Returns the number of listeners subscribed to one kind.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Returns the number of wildcard listeners.
    #[must_use]
    pub fn wildcard_listener_count(&self) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.wildcard.len()
    }

    /// Builds an immutable event and delivers it to every listener.
    ///
    /// Returns an error only when the payload does not belong to `kind`;
    /// listener failures are logged and counted in the summary.
    pub async fn dispatch(
        &self,
        kind: EventKind,
        payload: EventPayload,
        metadata: Option<EventMetadata>,
    ) -> AppResult<DispatchSummary> {
        let event = Arc::new(Event::new(
            kind,
            payload,
            metadata.unwrap_or_default(),
            Utc::now(),
        )?);

        let (specific, wildcard) = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            let specific = registry.by_kind.get(&kind).cloned().unwrap_or_default();
            (specific, registry.wildcard.clone())
        };

        let mut summary = DispatchSummary {
            event_id: event.id(),
            delivered: 0,
            failed: 0,
        };
        deliver(&event, specific, &mut summary).await;
        deliver(&event, wildcard, &mut summary).await;

        Ok(summary)
    }
}

async fn deliver(event: &Arc<Event>, listeners: Vec<Registration>, summary: &mut DispatchSummary) {
    let tasks: Vec<_> = listeners
        .into_iter()
        .map(|(_, listener)| {
            let name = listener.name().to_owned();
            let event = Arc::clone(event);
            let task = tokio::spawn(async move { listener.handle(&event).await });
            (name, task)
        })
        .collect();

    for (name, task) in tasks {
        match task.await {
            Ok(Ok(())) => summary.delivered += 1,
            Ok(Err(listener_error)) => {
                summary.failed += 1;
                warn!(
                    listener = %name,
                    kind = event.kind().as_str(),
                    event_id = %event.id(),
                    correlation_id = %event.metadata().correlation_id,
                    error = %listener_error,
                    "event listener failed"
                );
            }
            Err(join_error) => {
                summary.failed += 1;
                error!(
                    listener = %name,
                    kind = event.kind().as_str(),
                    event_id = %event.id(),
                    correlation_id = %event.metadata().correlation_id,
                    error = %join_error,
                    "event listener panicked"
                );
            }
        }
    }
}
