//! # Time: Wall-Clock Timestamps and the Block Clock
//!
//! Two notions of time coexist in the engine:
//!
//! - [`Timestamp`]: UTC, seconds precision, stamped on audit events. Used
//!   only for observability.
//! - [`BlockHeight`]: the monotonic bound that approval expiry is checked
//!   against. Read from a [`BlockClock`] at the moment an approval is
//!   looked up; no timer ever fires.
//!
//! Wall-clock time never decides a compliance outcome.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 timestamp. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, ComplianceError> {
        if !s.ends_with('Z') {
            return Err(ComplianceError::InvalidInput(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ComplianceError::InvalidInput(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Height of the ledger the engine runs beside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// Height `n` blocks after this one, saturating.
    pub fn plus(&self, blocks: u64) -> BlockHeight {
        BlockHeight(self.0.saturating_add(blocks))
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of the current block height.
///
/// Must be monotonic: a height once observed is never followed by a lower
/// one.
pub trait BlockClock: Send + Sync {
    /// The current height.
    fn current_height(&self) -> BlockHeight;
}

/// A clock advanced explicitly by its owner. Used by tests, the CLI
/// simulator, and hosts that feed heights from an external ledger.
#[derive(Debug, Default)]
pub struct ManualClock {
    height: AtomicU64,
}

impl ManualClock {
    /// A clock starting at `height`.
    pub fn new(height: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(height.0),
        }
    }

    /// Move forward by `blocks`, returning the new height.
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        let mut current = self.height.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(blocks);
            match self.height.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return BlockHeight(next),
                Err(observed) => current = observed,
            }
        }
    }

    /// Move to `height`. Heights below the current one are ignored.
    pub fn set(&self, height: BlockHeight) -> BlockHeight {
        let previous = self.height.fetch_max(height.0, Ordering::AcqRel);
        BlockHeight(previous.max(height.0))
    }
}

impl BlockClock for ManualClock {
    fn current_height(&self) -> BlockHeight {
        BlockHeight(self.height.load(Ordering::Acquire))
    }
}
