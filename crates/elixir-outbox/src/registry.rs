// crates/elixir-outbox/src/registry.rs
// ============================================================================
// Module: HandlerRegistry
// Description: Event-type keyed collection of `OutboxHandler` implementors.
// Purpose: Let the consumer loop dispatch a claimed event to the one handler
//          registered for its `OutboxEventType`, mirroring the teacher's
//          composite broker's scheme-keyed sink/source registries.
// Dependencies: elixir-core, std::collections::BTreeMap, std::sync::Arc
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use elixir_core::OutboxEventType;
use elixir_core::OutboxHandler;

/// Maps each [`OutboxEventType`] to the single handler that processes it.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<OutboxEventType, Arc<dyn OutboxHandler>>,
}

impl HandlerRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the event type it reports via
    /// [`OutboxHandler::event_type`], replacing any prior registration for
    /// that type.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn OutboxHandler>) -> Self {
        self.handlers.insert(handler.event_type(), handler);
        self
    }

    /// Looks up the handler registered for `event_type`, if any.
    #[must_use]
    pub fn get(&self, event_type: OutboxEventType) -> Option<Arc<dyn OutboxHandler>> {
        self.handlers.get(&event_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use elixir_core::OutboxError;
    use elixir_core::OutboxEvent;

    use super::*;

    struct StubHandler(OutboxEventType);

    #[async_trait]
    impl OutboxHandler for StubHandler {
        fn event_type(&self) -> OutboxEventType {
            self.0
        }

        async fn handle(&self, _event: &OutboxEvent) -> Result<(), OutboxError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_returns_the_handler_registered_for_its_own_event_type() {
        let registry = HandlerRegistry::new().with_handler(Arc::new(StubHandler(OutboxEventType::ProtocolUploaded)));
        assert!(registry.get(OutboxEventType::ProtocolUploaded).is_some());
        assert!(registry.get(OutboxEventType::ReextractionRequested).is_none());
    }
}
