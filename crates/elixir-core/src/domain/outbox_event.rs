// crates/elixir-core/src/domain/outbox_event.rs
// ============================================================================
// Module: OutboxEvent
// Description: Durable event queue row published transactionally alongside a
//              business write.
// Purpose: Model the at-least-once delivery lifecycle claimed under
//          `FOR UPDATE SKIP LOCKED`, retried with backoff, and eventually
//          dead-lettered.
// Dependencies: crate::identifiers, crate::time
// ============================================================================

//! ## Overview
//! An [`OutboxEvent`] is inserted in the same transaction as the business
//! write it announces (spec.md §4.5). The consumer claims pending/failed
//! rows whose `next_retry_at` has elapsed, invokes a registered handler, and
//! on failure bumps `attempts` and schedules the next retry — moving to
//! [`OutboxStatus::DeadLetter`] once `max_attempts` is exhausted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::identifiers::OutboxEventId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// The two event types defined in spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxEventType {
    /// Emitted by confirm-upload; payload is `{protocol_id, file_uri}`.
    ProtocolUploaded,
    /// Emitted by the reextract endpoint; payload is `{protocol_id, reason}`.
    ReextractionRequested,
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of an outbox event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Not yet claimed.
    Pending,
    /// Claimed by a worker; being processed.
    Claimed,
    /// Handler succeeded.
    Delivered,
    /// Handler raised; will be retried until `max_attempts`.
    Failed,
    /// `max_attempts` exhausted; requires operator intervention.
    DeadLetter,
}

// ============================================================================
// SECTION: OutboxEvent
// ============================================================================

/// Default maximum delivery attempts before an event is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A durable outbox event row.
///
/// # Invariants
/// - `status = Claimed` is visible to at most one worker at a time (spec.md
///   §8 invariant 6), enforced by the store's `FOR UPDATE SKIP LOCKED`
///   claim query, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Unique identifier.
    pub id: OutboxEventId,
    /// The event type.
    pub event_type: OutboxEventType,
    /// JSON payload, shaped per `event_type`.
    pub payload: JsonValue,
    /// Current delivery status.
    pub status: OutboxStatus,
    /// Number of delivery attempts made so far.
    pub attempts: u32,
    /// Most recent handler error, if any.
    pub last_error: Option<String>,
    /// Earliest time the event may be claimed again, after a failure.
    pub next_retry_at: Option<Timestamp>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

impl OutboxEvent {
    /// Creates a new pending event.
    #[must_use]
    pub fn new(event_type: OutboxEventType, payload: JsonValue) -> Self {
        let now = Timestamp::now();
        Self {
            id: OutboxEventId::new(),
            event_type,
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the event claimed for processing.
    pub fn mark_claimed(&mut self) {
        self.status = OutboxStatus::Claimed;
        self.updated_at = Timestamp::now();
    }

    /// Marks the event delivered successfully.
    pub fn mark_delivered(&mut self) {
        self.status = OutboxStatus::Delivered;
        self.last_error = None;
        self.updated_at = Timestamp::now();
    }

    /// Records a handler failure: increments `attempts`, stores the error,
    /// and either schedules the next retry or moves to `dead_letter` if
    /// `max_attempts` has been reached (spec.md §4.5 step 5).
    pub fn mark_failed(&mut self, error: impl Into<String>, max_attempts: u32, backoff: time::Duration) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.updated_at = Timestamp::now();
        if self.attempts >= max_attempts {
            self.status = OutboxStatus::DeadLetter;
            self.next_retry_at = None;
        } else {
            self.status = OutboxStatus::Failed;
            self.next_retry_at = Some(Timestamp::now().plus(backoff));
        }
    }

    /// Returns whether this event is eligible to be claimed at `now`: status
    /// is `pending` or `failed`, and `next_retry_at` has elapsed (or is
    /// unset).
    #[must_use]
    pub fn is_claimable(&self, now: Timestamp) -> bool {
        matches!(self.status, OutboxStatus::Pending | OutboxStatus::Failed)
            && self.next_retry_at.is_none_or(|retry_at| now >= retry_at)
    }
}

/// Computes the exponential backoff delay for retry attempt `attempt`
/// (1-based), per spec.md §4.4's "1 s, 2 s, 4 s" shape generalized to the
/// outbox's own retry schedule: `2^(attempt - 1)` seconds.
#[must_use]
pub fn backoff_for_attempt(attempt: u32) -> time::Duration {
    let seconds = 2u64.saturating_pow(attempt.saturating_sub(1));
    time::Duration::seconds(seconds.min(3600) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_claimable_immediately() {
        let event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, serde_json::json!({}));
        assert!(event.is_claimable(Timestamp::now()));
    }

    #[test]
    fn failure_before_max_attempts_schedules_retry() {
        let mut event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, serde_json::json!({}));
        event.mark_failed("boom", DEFAULT_MAX_ATTEMPTS, time::Duration::seconds(2));
        assert_eq!(event.status, OutboxStatus::Failed);
        assert_eq!(event.attempts, 1);
        assert!(event.next_retry_at.is_some());
        assert!(!event.is_claimable(Timestamp::now()));
    }

    #[test]
    fn failure_at_max_attempts_moves_to_dead_letter() {
        let mut event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, serde_json::json!({}));
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            event.mark_failed("boom", DEFAULT_MAX_ATTEMPTS, time::Duration::seconds(1));
        }
        assert_eq!(event.status, OutboxStatus::DeadLetter);
        assert!(event.next_retry_at.is_none());
        assert!(!event.is_claimable(Timestamp::now()));
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_for_attempt(1), time::Duration::seconds(1));
        assert_eq!(backoff_for_attempt(2), time::Duration::seconds(2));
        assert_eq!(backoff_for_attempt(3), time::Duration::seconds(4));
    }

    #[test]
    fn delivered_event_is_not_claimable() {
        let mut event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, serde_json::json!({}));
        event.mark_delivered();
        assert!(!event.is_claimable(Timestamp::now()));
    }
}
