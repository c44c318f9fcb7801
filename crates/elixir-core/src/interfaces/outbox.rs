// crates/elixir-core/src/interfaces/outbox.rs
// ============================================================================
// Module: Outbox Traits
// Description: Durable event queue claim/dispatch trait surface.
// Purpose: Let `elixir-outbox`'s consumer loop depend on a storage-agnostic
//          claim query and a pluggable per-event-type handler registry.
// Dependencies: async-trait, crate::domain::outbox_event, thiserror
// ============================================================================

//! ## Overview
//! [`OutboxStore`] owns the `FOR UPDATE SKIP LOCKED` claim query (spec.md
//! §4.5, §8 invariant 6); [`OutboxHandler`] is implemented once per
//! [`OutboxEventType`] and registered with the consumer loop in
//! `elixir-outbox`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::outbox_event::OutboxEvent;
use crate::domain::outbox_event::OutboxEventType;
use crate::identifiers::OutboxEventId;

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure interacting with the outbox store.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The backing store is unreachable or returned an unexpected error.
    #[error("outbox backend error: {0}")]
    Backend(String),
    /// The handler registered for an event type raised while processing it.
    #[error("handler error for {event_type:?}: {message}")]
    Handler {
        /// The event type whose handler raised.
        event_type: OutboxEventType,
        /// Description of the handler failure.
        message: String,
    },
}

// ============================================================================
// SECTION: OutboxStore
// ============================================================================

/// Durable storage for outbox events, including the claim query.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts a new event, intended to be called in the same transaction as
    /// the business write it announces.
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if the write fails.
    async fn publish(&self, event: &OutboxEvent) -> Result<(), OutboxError>;

    /// Atomically claims up to `limit` claimable events (`pending` or
    /// `failed` with an elapsed `next_retry_at`) using `FOR UPDATE SKIP
    /// LOCKED`, so concurrent consumers never double-claim a row (spec.md §8
    /// invariant 6).
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if the claim query fails.
    async fn claim_batch(&self, limit: u32) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Marks an event delivered.
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if the write fails.
    async fn mark_delivered(&self, id: OutboxEventId) -> Result<(), OutboxError>;

    /// Records a handler failure, scheduling retry or dead-lettering per
    /// [`crate::domain::outbox_event::OutboxEvent::mark_failed`].
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if the write fails.
    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError>;

    /// Lists dead-lettered events for operator inspection.
    ///
    /// # Errors
    /// Returns [`OutboxError::Backend`] if the read fails.
    async fn list_dead_letters(&self) -> Result<Vec<OutboxEvent>, OutboxError>;
}

// ============================================================================
// SECTION: OutboxHandler
// ============================================================================

/// Processes one outbox event of a given type.
#[async_trait]
pub trait OutboxHandler: Send + Sync {
    /// The event type this handler processes.
    fn event_type(&self) -> OutboxEventType;

    /// Processes the event's payload, typically by triggering a pipeline run.
    ///
    /// # Errors
    /// Returns [`OutboxError::Handler`] if processing fails; the consumer
    /// loop reports this to [`OutboxStore::mark_failed`].
    async fn handle(&self, event: &OutboxEvent) -> Result<(), OutboxError>;
}
