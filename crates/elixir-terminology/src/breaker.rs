// crates/elixir-terminology/src/breaker.rs
// ============================================================================
// Module: CircuitBreaker
// Description: Per-vocabulary consecutive-failure circuit breaker.
// Purpose: Stop hammering a degraded vocabulary API after repeated failures,
//          surfacing `TerminologyError::BreakerOpen` instead (spec.md §4.6.4
//          "agentic retry loop... bounded", applied at the adapter layer).
// Dependencies: std::sync::Mutex, std::time::Instant
// ============================================================================

//! ## Overview
//! Opens after three consecutive failures and stays open for a 60 second
//! cooldown, matching the breaker posture `elixir-llm`'s gateway uses for LLM
//! calls — the same shape, applied independently at each layer since an LLM
//! outage and a terminology outage are unrelated failure domains.

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

const FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN: Duration = Duration::from_secs(60);

struct State {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A consecutive-failure circuit breaker with a fixed cooldown.
pub struct CircuitBreaker {
    state: Mutex<State>,
}

impl CircuitBreaker {
    /// Builds a closed breaker.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(State { consecutive_failures: 0, opened_at: None }) }
    }

    /// Returns the remaining cooldown in whole seconds if the breaker is
    /// currently open, or `None` if calls may proceed.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let opened_at = state.opened_at?;
        let elapsed = opened_at.elapsed();
        if elapsed >= COOLDOWN {
            state.opened_at = None;
            state.consecutive_failures = 0;
            return None;
        }
        Some((COOLDOWN - elapsed).as_secs().max(1))
    }

    /// Records a successful call, closing the breaker.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    /// Records a failed call, opening the breaker once the threshold is hit.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.consecutive_failures += 1;
        if state.consecutive_failures >= FAILURE_THRESHOLD && state.opened_at.is_none() {
            state.opened_at = Some(Instant::now());
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_breaker_allows_calls() {
        let breaker = CircuitBreaker::new();
        assert_eq!(breaker.retry_after_secs(), None);
    }

    #[test]
    fn opens_after_three_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.retry_after_secs(), None);
        breaker.record_failure();
        assert!(breaker.retry_after_secs().is_some());
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.retry_after_secs(), None);
    }
}
