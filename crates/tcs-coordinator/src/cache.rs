//! # Off-Chain Approval Cache
//!
//! Decisions written ahead of time by off-chain provider owners, keyed by
//! [`ActionId`].
//!
//! ## Slot lifecycle
//!
//! ```text
//! EMPTY ──write──▶ PENDING ──take (height <= bound)──▶ CONSUMED
//!                     │
//!                     └──take (height > bound)──▶ EXPIRED (reads as deny)
//! ```
//!
//! ## Security Invariant
//!
//! A pending approval is observed at most once. [`ApprovalCache::take`]
//! removes the entry and returns it in one `DashMap::remove`, which holds
//! the shard lock across the read and the clear; of any number of
//! concurrent takes on one id, exactly one receives the entry.

use dashmap::DashMap;
use tcs_core::{ActionId, Address, BlockHeight, CheckResult, ProviderId, ProviderVersion, Timestamp};

/// A decision awaiting its single use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    /// The committed decision.
    pub result: CheckResult,
    /// Last block height at which the decision may be used.
    pub expiry_bound: BlockHeight,
    /// Provider the decision was written for.
    pub provider_id: ProviderId,
    /// Provider revision the decision was written against.
    pub provider_version: ProviderVersion,
    /// Owner that wrote the decision.
    pub writer: Address,
    /// Wall-clock time of the write.
    pub written_at: Timestamp,
}

impl PendingApproval {
    /// Whether the decision is still usable at `height`.
    pub fn is_live_at(&self, height: BlockHeight) -> bool {
        height <= self.expiry_bound
    }
}

/// Concurrent map of pending approvals.
#[derive(Default)]
pub struct ApprovalCache {
    entries: DashMap<ActionId, PendingApproval>,
}

impl ApprovalCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `approval` for `action_id`, replacing any pending one.
    ///
    /// Returns the replaced approval, if there was one.
    pub fn write(&self, action_id: ActionId, approval: PendingApproval) -> Option<PendingApproval> {
        self.entries.insert(action_id, approval)
    }

    /// Atomically remove the approval for `action_id`.
    ///
    /// Returns it only if it is live at `height`. An expired entry is
    /// removed as well and yields `None`.
    pub fn take(&self, action_id: &ActionId, height: BlockHeight) -> Option<PendingApproval> {
        let (_, approval) = self.entries.remove(action_id)?;
        if approval.is_live_at(height) {
            Some(approval)
        } else {
            tracing::debug!(
                action_id = %action_id,
                expiry_bound = %approval.expiry_bound,
                height = %height,
                "pending approval expired before use"
            );
            None
        }
    }

    /// Non-consuming view of the approval for `action_id`.
    pub fn pending_approval(&self, action_id: &ActionId) -> Option<PendingApproval> {
        self.entries.get(action_id).map(|entry| entry.value().clone())
    }

    /// Drop every entry that is no longer live at `height`, returning how
    /// many were removed.
    pub fn purge_expired(&self, height: BlockHeight) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, approval| approval.is_live_at(height));
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ApprovalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
