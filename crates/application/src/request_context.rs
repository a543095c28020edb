use gatehouse_core::{CorrelationId, SubjectId};
use gatehouse_domain::{EventArea, EventMetadata};

/// Per-request forensics threaded through use-cases into events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request correlation identifier.
    pub correlation_id: CorrelationId,
    /// Caller address.
    pub source_address: Option<String>,
    /// Caller user-agent.
    pub client_descriptor: Option<String>,
}

impl RequestContext {
    /// Creates a context with a fresh correlation id.
    #[must_use]
    pub fn new(source_address: Option<String>, client_descriptor: Option<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            source_address,
            client_descriptor,
        }
    }

    /// Builds event metadata carrying this context.
    #[must_use]
    pub fn event_metadata(&self, area: EventArea, actor_id: Option<SubjectId>) -> EventMetadata {
        let metadata = EventMetadata::new(area)
            .with_correlation_id(self.correlation_id)
            .with_request_context(self.source_address.clone(), self.client_descriptor.clone());

        match actor_id {
            Some(actor_id) => metadata.with_actor(actor_id),
            None => metadata,
        }
    }
}
