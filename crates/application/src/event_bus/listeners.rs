use async_trait::async_trait;
use tracing::debug;

use gatehouse_core::AppResult;
use gatehouse_domain::Event;

use super::EventListener;

/// Wildcard listener writing every event to the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventListener;

#[async_trait]
impl EventListener for TracingEventListener {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn handle(&self, event: &Event) -> AppResult<()> {
        let metadata = event.metadata();
        debug!(
            event_id = %event.id(),
            kind = event.kind().as_str(),
            area = metadata.area.as_str(),
            actor_id = ?metadata.actor_id,
            correlation_id = %metadata.correlation_id,
            occurred_at = %event.occurred_at(),
            "domain event dispatched"
        );

        Ok(())
    }
}
