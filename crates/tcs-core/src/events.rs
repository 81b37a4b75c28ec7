//! # Audit Event Log
//!
//! The engine's only externally visible history. Registry updates, every
//! individual compliance check, every written off-chain result and every
//! token transfer are appended here in the order they happen.
//!
//! ## Invariants
//!
//! - Ordinals are assigned under the log lock and strictly increase; they
//!   are never reused, including after trimming.
//! - Each record is individually digestable via `CanonicalBytes` +
//!   `sha256_digest`.
//! - When the configured capacity is exceeded the oldest 10% of records are
//!   dropped. Hosts that need the full history must drain the log to
//!   durable storage before that point.
//!
//! The engine never reads its own events back to make a decision.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::action::{decimal_u128, ActionId};
use crate::canonical::CanonicalBytes;
use crate::decision::CheckResult;
use crate::digest::{sha256_digest, ContentDigest};
use crate::identity::{Address, ProviderId};
use crate::temporal::Timestamp;

/// An auditable occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// A provider was registered or its metadata, owner or version changed.
    ProviderInfoUpdate {
        /// The provider.
        provider_id: ProviderId,
        /// Its owner after the update.
        owner: Address,
    },
    /// One provider was consulted for one action.
    ComplianceCheckPerformed {
        /// The provider consulted.
        provider_id: ProviderId,
        /// Identifier of the action as pinned to this provider.
        action_id: ActionId,
        /// Subject of the check.
        to: Address,
        /// The provider's decision.
        check_result: CheckResult,
    },
    /// A provider owner committed an off-chain decision.
    ComplianceCheckResultWritten {
        /// The provider written for.
        provider_id: ProviderId,
        /// The action the decision applies to.
        action_id: ActionId,
        /// The committed decision.
        check_result: CheckResult,
    },
    /// A token moved balances after a permitted check.
    Transfer {
        /// The token.
        instrument: Address,
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Amount moved.
        #[serde(with = "decimal_u128")]
        amount: u128,
    },
}

impl Event {
    /// Short name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderInfoUpdate { .. } => "ProviderInfoUpdate",
            Self::ComplianceCheckPerformed { .. } => "ComplianceCheckPerformed",
            Self::ComplianceCheckResultWritten { .. } => "ComplianceCheckResultWritten",
            Self::Transfer { .. } => "Transfer",
        }
    }

    /// Whether this is a `ComplianceCheckPerformed` record.
    pub fn is_check(&self) -> bool {
        matches!(self, Self::ComplianceCheckPerformed { .. })
    }

    /// Whether this is a `Transfer` record.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer { .. })
    }
}

/// An event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, strictly increasing.
    pub ordinal: u64,
    /// Wall-clock time of the append.
    pub timestamp: Timestamp,
    /// The event itself.
    #[serde(flatten)]
    pub event: Event,
}

impl EventRecord {
    /// Content digest of this record, for tamper evidence.
    ///
    /// Returns `None` if canonicalization fails.
    pub fn digest(&self) -> Option<ContentDigest> {
        match CanonicalBytes::new(self) {
            Ok(canonical) => Some(sha256_digest(&canonical)),
            Err(e) => {
                tracing::warn!(
                    ordinal = self.ordinal,
                    error = %e,
                    "event canonicalization failed, digest unavailable"
                );
                None
            }
        }
    }
}

struct LogInner {
    records: Vec<EventRecord>,
    next_ordinal: u64,
}

/// Append-only, bounded, thread-safe event log shared by every component.
pub struct EventLog {
    inner: Mutex<LogInner>,
    max_entries: usize,
}

impl EventLog {
    /// Create a log retaining at most `max_entries` records.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                records: Vec::new(),
                next_ordinal: 0,
            }),
            max_entries: max_entries.max(1),
        }
    }

    /// Append an event, returning its ordinal.
    pub fn append(&self, event: Event) -> u64 {
        let mut inner = self.inner.lock();
        let ordinal = inner.next_ordinal;
        inner.next_ordinal += 1;
        tracing::debug!(ordinal, kind = event.kind(), "event appended");
        inner.records.push(EventRecord {
            ordinal,
            timestamp: Timestamp::now(),
            event,
        });
        if inner.records.len() > self.max_entries {
            let trim_count = (self.max_entries / 10).max(1);
            inner.records.drain(..trim_count);
        }
        ordinal
    }

    /// The ordinal the next appended event will receive.
    ///
    /// Take a cursor before an operation and pass it to [`EventLog::since`]
    /// to see exactly what that operation recorded.
    pub fn cursor(&self) -> u64 {
        self.inner.lock().next_ordinal
    }

    /// Snapshot of every retained record.
    pub fn records(&self) -> Vec<EventRecord> {
        self.inner.lock().records.clone()
    }

    /// Snapshot of retained records with `ordinal >= cursor`.
    pub fn since(&self, cursor: u64) -> Vec<EventRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| r.ordinal >= cursor)
            .cloned()
            .collect()
    }

    /// Retained records for which `pred` holds.
    pub fn filter(&self, pred: impl Fn(&Event) -> bool) -> Vec<EventRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| pred(&r.event))
            .cloned()
            .collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether no records are retained.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u64) -> Event {
        Event::ProviderInfoUpdate {
            provider_id: ProviderId(id),
            owner: Address::from_seed("owner"),
        }
    }

    #[test]
    fn ordinals_increase() {
        let log = EventLog::new(100);
        assert_eq!(log.append(info(1)), 0);
        assert_eq!(log.append(info(2)), 1);
        assert_eq!(log.cursor(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn since_returns_only_new_records() {
        let log = EventLog::new(100);
        log.append(info(1));
        let mark = log.cursor();
        log.append(info(2));
        log.append(info(3));
        let fresh = log.since(mark);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].ordinal, mark);
    }

    #[test]
    fn trims_oldest_tenth_past_capacity() {
        let log = EventLog::new(10);
        for i in 0..11 {
            log.append(info(i));
        }
        assert_eq!(log.len(), 10);
        assert_eq!(log.records()[0].ordinal, 1);
        assert_eq!(log.cursor(), 11);
    }

    #[test]
    fn filter_by_kind() {
        let log = EventLog::new(100);
        log.append(info(1));
        log.append(Event::Transfer {
            instrument: Address::from_seed("token"),
            from: Address::from_seed("a"),
            to: Address::from_seed("b"),
            amount: 5,
        });
        assert_eq!(log.filter(Event::is_transfer).len(), 1);
        assert_eq!(log.filter(Event::is_check).len(), 0);
    }

    #[test]
    fn record_digest_is_available() {
        let log = EventLog::new(10);
        log.append(info(1));
        let record = &log.records()[0];
        assert!(record.digest().is_some());
    }

    #[test]
    fn record_serializes_with_event_tag() {
        let log = EventLog::new(10);
        log.append(info(4));
        let json = serde_json::to_value(&log.records()[0]).unwrap();
        assert_eq!(json["event"], "ProviderInfoUpdate");
        assert_eq!(json["provider_id"], 4);
        assert_eq!(json["ordinal"], 0);
    }
}
