// crates/elixir-outbox/src/consumer.rs
// ============================================================================
// Module: Consumer
// Description: Poll/claim/dispatch loop driving the transactional outbox.
// Purpose: Claim a batch of claimable events every poll interval, dispatch
//          each to its registered handler, and record delivery/failure
//          (spec.md §4.5).
// Dependencies: elixir-core, elixir-outbox::registry, tokio, tracing
// ============================================================================

//! ## Overview
//! One [`Consumer`] owns a polling loop against an
//! [`elixir_core::OutboxStore`]. Each tick claims up to `batch_size` events
//! (the store's `FOR UPDATE SKIP LOCKED` query makes this safe to run from
//! multiple processes), dispatches each to the [`crate::registry::HandlerRegistry`]
//! entry for its event type, and reports the outcome back to the store. An
//! event with no registered handler is reported as a handler failure rather
//! than silently dropped, so it still enters the retry/dead-letter path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use elixir_core::OutboxError;
use elixir_core::OutboxEvent;
use elixir_core::OutboxStore;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::registry::HandlerRegistry;

/// Default interval between claim polls (spec.md §4.5: "polls every 2s").
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default number of events claimed per poll.
pub const DEFAULT_BATCH_SIZE: u32 = 20;

/// Drives the claim/dispatch/report loop against one [`OutboxStore`].
pub struct Consumer {
    store: Arc<dyn OutboxStore>,
    registry: HandlerRegistry,
    poll_interval: Duration,
    batch_size: u32,
}

impl Consumer {
    /// Builds a consumer with the default poll interval and batch size.
    #[must_use]
    pub fn new(store: Arc<dyn OutboxStore>, registry: HandlerRegistry) -> Self {
        Self { store, registry, poll_interval: DEFAULT_POLL_INTERVAL, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Overrides the poll interval and claim batch size.
    #[must_use]
    pub fn with_schedule(mut self, poll_interval: Duration, batch_size: u32) -> Self {
        self.poll_interval = poll_interval;
        self.batch_size = batch_size;
        self
    }

    /// Runs the poll/claim/dispatch loop until `shutdown` reports `true`.
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if a claim call itself fails; a
    /// per-event handler failure is recorded via `mark_failed` and does not
    /// stop the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), OutboxError> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let claimed = self.store.claim_batch(self.batch_size).await?;
            for event in &claimed {
                self.dispatch_one(event).await;
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn dispatch_one(&self, event: &OutboxEvent) {
        let Some(handler) = self.registry.get(event.event_type) else {
            warn!(event_id = %event.id, event_type = ?event.event_type, "no handler registered for outbox event type");
            if let Err(error) = self.store.mark_failed(event.id, "no handler registered for this event type").await {
                error!(%error, event_id = %event.id, "failed to record missing-handler failure");
            }
            return;
        };

        match handler.handle(event).await {
            Ok(()) => {
                info!(event_id = %event.id, event_type = ?event.event_type, "outbox event delivered");
                if let Err(error) = self.store.mark_delivered(event.id).await {
                    error!(%error, event_id = %event.id, "failed to record successful delivery");
                }
            }
            Err(error) => {
                warn!(%error, event_id = %event.id, event_type = ?event.event_type, "outbox handler failed");
                if let Err(mark_error) = self.store.mark_failed(event.id, &error.to_string()).await {
                    error!(error = %mark_error, event_id = %event.id, "failed to record handler failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use elixir_core::OutboxEventType;
    use elixir_core::identifiers::OutboxEventId;

    use super::*;

    #[derive(Default)]
    struct FakeStore {
        events: StdMutex<Vec<OutboxEvent>>,
        delivered: StdMutex<Vec<OutboxEventId>>,
        failed: StdMutex<Vec<OutboxEventId>>,
    }

    #[async_trait]
    impl OutboxStore for FakeStore {
        async fn publish(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
            self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event.clone());
            Ok(())
        }

        async fn claim_batch(&self, _limit: u32) -> Result<Vec<OutboxEvent>, OutboxError> {
            Ok(std::mem::take(&mut *self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner)))
        }

        async fn mark_delivered(&self, id: OutboxEventId) -> Result<(), OutboxError> {
            self.delivered.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(id);
            Ok(())
        }

        async fn mark_failed(&self, id: OutboxEventId, _error: &str) -> Result<(), OutboxError> {
            self.failed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(id);
            Ok(())
        }

        async fn list_dead_letters(&self) -> Result<Vec<OutboxEvent>, OutboxError> {
            Ok(Vec::new())
        }
    }

    struct NoopHandler;

    #[async_trait]
    impl elixir_core::OutboxHandler for NoopHandler {
        fn event_type(&self) -> OutboxEventType {
            OutboxEventType::ProtocolUploaded
        }

        async fn handle(&self, _event: &OutboxEvent) -> Result<(), OutboxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_claimed_event_with_a_registered_handler_is_marked_delivered() {
        let store = Arc::new(FakeStore::default());
        let event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, serde_json::json!({}));
        let event_id = event.id;
        store.publish(&event).await.expect("publish");

        let registry = HandlerRegistry::new().with_handler(Arc::new(NoopHandler));
        let consumer = Consumer::new(store.clone(), registry);
        let claimed = store.claim_batch(10).await.expect("claim");
        assert_eq!(claimed.len(), 1);
        consumer.dispatch_one(&claimed[0]).await;

        assert_eq!(store.delivered.lock().unwrap_or_else(std::sync::PoisonError::into_inner).as_slice(), [event_id]);
    }

    #[tokio::test]
    async fn a_claimed_event_with_no_registered_handler_is_marked_failed() {
        let store = Arc::new(FakeStore::default());
        let event = OutboxEvent::new(OutboxEventType::ReextractionRequested, serde_json::json!({}));
        let event_id = event.id;
        store.publish(&event).await.expect("publish");

        let consumer = Consumer::new(store.clone(), HandlerRegistry::new());
        let claimed = store.claim_batch(10).await.expect("claim");
        consumer.dispatch_one(&claimed[0]).await;

        assert_eq!(store.failed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).as_slice(), [event_id]);
    }
}
