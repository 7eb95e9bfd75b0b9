//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds
//! precision. Deadlines, funding times, and audit timestamps all use
//! this type so comparisons are deterministic regardless of where a
//! record was produced.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse from an RFC 3339 string, converting any offset to UTC.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            EngineError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From a Unix epoch timestamp in seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, EngineError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| EngineError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// The timestamp shifted forward by a number of hours.
    ///
    /// Saturates at the chrono representable range rather than
    /// panicking; deadline arithmetic never aborts a transition.
    pub fn plus_hours(&self, hours: i64) -> Self {
        match Duration::try_hours(hours).and_then(|d| self.0.checked_add_signed(d)) {
            Some(dt) => Self(dt),
            None => Self(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO8601 with Z suffix (e.g. `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision.
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
