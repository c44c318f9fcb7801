// crates/elixir-core/src/time.rs
// ============================================================================
// Module: ElixirTrials Time Model
// Description: Canonical wall-clock timestamp representation.
// Purpose: Give every persisted record a single, serializable timestamp type
//          instead of passing `time::OffsetDateTime` around directly.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! Unlike a deterministic-replay engine, ElixirTrials persists real wall-clock
//! times (`created_at`, `updated_at`, audit timestamps) because reviewers and
//! operators reason about them directly. [`Timestamp`] wraps
//! [`time::OffsetDateTime`] normalized to UTC and serializes as RFC 3339,
//! matching the column type `timestamptz` on the Postgres side.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC wall-clock timestamp.
///
/// # Invariants
/// - Always normalized to the UTC offset.
/// - Serializes as an RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an existing `OffsetDateTime`, normalizing it to UTC.
    #[must_use]
    pub fn from_offset(dt: OffsetDateTime) -> Self {
        Self(dt.to_offset(time::UtcOffset::UTC))
    }

    /// Returns the inner `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Returns whether `self` is at least `duration` older than `other`.
    #[must_use]
    pub fn elapsed_since(&self, other: Self) -> time::Duration {
        self.0 - other.0
    }

    /// Returns a timestamp `duration` after `self`.
    #[must_use]
    pub fn plus(&self, duration: time::Duration) -> Self {
        Self(self.0 + duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => fmt::Debug::fmt(&self.0, f),
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = time::error::Parse;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OffsetDateTime::parse(&value, &Rfc3339).map(Self::from_offset)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.0.format(&Rfc3339).unwrap_or_else(|_| value.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let ts = Timestamp::now();
        let encoded: String = ts.into();
        let decoded = Timestamp::try_from(encoded).expect("parse");
        // RFC 3339 formatting truncates to the stored precision; compare at
        // second granularity to avoid sub-nanosecond formatting drift.
        assert_eq!(decoded.as_offset().unix_timestamp(), ts.as_offset().unix_timestamp());
    }

    #[test]
    fn elapsed_since_is_non_negative_for_later_timestamp() {
        let earlier = Timestamp::now();
        let later = earlier.plus(time::Duration::seconds(5));
        assert!(later.elapsed_since(earlier) >= time::Duration::seconds(5));
    }
}
