// crates/elixir-llm/src/breaker.rs
// ============================================================================
// Module: TargetBreaker
// Description: Per-target consecutive-failure circuit breaker.
// Purpose: Stop calling a degraded LLM target after repeated failures,
//          surfacing `LlmError::BreakerOpen` instead (spec.md §4.4: "3
//          consecutive failures → open for 60 s").
// Dependencies: std::sync::Mutex, std::time::Instant
// ============================================================================

//! ## Overview
//! One breaker instance per logical target (`"extraction"`,
//! `"grounding-agentic"`, ...), process-local, matching
//! `elixir_terminology::CircuitBreaker`'s shape exactly — the same posture
//! applied to a different failure domain (spec.md §9 "Circuit breaker
//! shared state... each worker gets its own breaker").

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

const FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN: Duration = Duration::from_secs(60);

struct State {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A consecutive-failure circuit breaker with a fixed 60s cooldown.
pub struct TargetBreaker {
    state: Mutex<State>,
}

impl TargetBreaker {
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

impl Default for TargetBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_three_consecutive_failures_and_not_before() {
        let breaker = TargetBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.retry_after_secs(), None);
        breaker.record_failure();
        assert!(breaker.retry_after_secs().is_some());
    }

    #[test]
    fn success_closes_the_breaker() {
        let breaker = TargetBreaker::new();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.retry_after_secs(), None);
    }
}
