//! # Compliance Coordinator
//!
//! Entry point for instruments asking "may this action proceed?" and for
//! off-chain provider owners committing decisions ahead of time.
//!
//! ## Evaluation order
//!
//! `perform_check` resolves the full delegation chain before evaluating
//! anything, then walks it from the root ancestor down to the provider the
//! action names:
//!
//! ```text
//! P (root) ──permit──▶ C ──permit──▶ ... ──▶ named provider
//!    │                 │
//!    deny              deny
//!    ▼                 ▼
//!  return            return
//! ```
//!
//! Each provider reached records exactly one `ComplianceCheckPerformed`,
//! parent before child. The first denial ends the walk, so providers below
//! it are never evaluated and record nothing.
//!
//! An ancestor is consulted with the action re-pinned to the ancestor's id
//! and current version; every other field is carried over unchanged.
//!
//! ## Security Invariant
//!
//! Chain resolution (unknown ids, cycles, depth) completes before the first
//! rule runs or the first approval is consumed. A chain that cannot be
//! resolved fails with no events and no consumed approvals.

use std::collections::HashSet;
use std::sync::Arc;

use tcs_core::{
    compute_action_hash, Action, ActionId, Address, BlockClock, BlockHeight, CheckResult,
    ComplianceError, ComplianceRule, EngineConfig, Event, EventLog, ProviderId,
    ProviderVersion, Timestamp,
};
use tcs_registry::{ProviderBinding, ProviderRecord, ProviderRegistry};

use crate::cache::{ApprovalCache, PendingApproval};

/// How one provider produces its decision.
#[derive(Clone)]
pub enum Evaluation {
    /// A synchronous rule with no parent.
    OnChainRule(Arc<dyn ComplianceRule>),
    /// A synchronous rule that additionally requires `parent`'s approval.
    Delegating {
        /// The local rule.
        rule: Arc<dyn ComplianceRule>,
        /// The provider consulted first.
        parent: ProviderId,
    },
    /// A decision written ahead of time by the provider's owner.
    OffChainGate,
}

impl Evaluation {
    /// Classify a registered provider.
    pub fn of(record: &ProviderRecord) -> Self {
        match &record.binding {
            ProviderBinding::OffChain => Self::OffChainGate,
            ProviderBinding::OnChain(rule) => match rule.parent() {
                Some(parent) => Self::Delegating {
                    rule: Arc::clone(rule),
                    parent,
                },
                None => Self::OnChainRule(Arc::clone(rule)),
            },
        }
    }

    /// The provider this one delegates to, if any.
    pub fn parent(&self) -> Option<ProviderId> {
        match self {
            Self::Delegating { parent, .. } => Some(*parent),
            Self::OnChainRule(_) | Self::OffChainGate => None,
        }
    }

    /// Metric label for this evaluation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OnChainRule(_) => "on_chain",
            Self::Delegating { .. } => "delegating",
            Self::OffChainGate => "off_chain",
        }
    }
}

impl std::fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnChainRule(rule) => f.debug_tuple("OnChainRule").field(&rule.address()).finish(),
            Self::Delegating { rule, parent } => f
                .debug_struct("Delegating")
                .field("rule", &rule.address())
                .field("parent", parent)
                .finish(),
            Self::OffChainGate => f.write_str("OffChainGate"),
        }
    }
}

/// One resolved provider in a delegation chain.
#[derive(Debug, Clone)]
struct ChainLink {
    provider_id: ProviderId,
    provider_version: ProviderVersion,
    evaluation: Evaluation,
}

/// The compliance coordinator. Share one per deployment by `Arc`.
pub struct ComplianceCoordinator {
    registry: Arc<ProviderRegistry>,
    approvals: ApprovalCache,
    events: Arc<EventLog>,
    clock: Arc<dyn BlockClock>,
    config: EngineConfig,
}

impl ComplianceCoordinator {
    /// A coordinator over `registry`, recording to the registry's event log
    /// and reading heights from `clock`.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        clock: Arc<dyn BlockClock>,
        config: EngineConfig,
    ) -> Self {
        let events = Arc::clone(registry.events());
        Self {
            registry,
            approvals: ApprovalCache::new(),
            events,
            clock,
            config,
        }
    }

    /// The provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The shared event log.
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current block height.
    pub fn current_height(&self) -> BlockHeight {
        self.clock.current_height()
    }

    /// Identifier of `action`. Pure; any caller can reproduce it.
    pub fn compute_action_hash(&self, action: &Action) -> Result<ActionId, ComplianceError> {
        compute_action_hash(action)
    }

    /// Current version of a provider.
    pub fn current_version(&self, id: ProviderId) -> Result<ProviderVersion, ComplianceError> {
        self.registry.current_version(id)
    }

    /// Decide whether `action` may proceed.
    ///
    /// A denial is `Ok(CheckResult::Deny)`, never an error. A missing or
    /// expired off-chain approval is a denial.
    ///
    /// # Errors
    ///
    /// `NotFound` if any provider in the chain is unregistered,
    /// `CycleDetected` if the chain revisits a provider,
    /// `DelegationTooDeep` if it exceeds the configured depth.
    pub fn perform_check(&self, action: &Action) -> Result<CheckResult, ComplianceError> {
        let chain = self.resolve_chain(action.provider_id)?;
        let named = chain.len().saturating_sub(1);

        for (position, link) in chain.iter().enumerate() {
            let result = if position == named {
                self.evaluate(link, action)?
            } else {
                let pinned = action.for_provider(link.provider_id, link.provider_version);
                self.evaluate(link, &pinned)?
            };
            if !result.is_permitted() {
                tracing::debug!(
                    provider_id = %action.provider_id,
                    denied_by = %link.provider_id,
                    "compliance chain short-circuited"
                );
                return Ok(result);
            }
        }
        Ok(CheckResult::Permit)
    }

    /// Commit an off-chain decision for `action_id`.
    ///
    /// Replaces any approval still pending for the same id. Emits
    /// `ComplianceCheckResultWritten`.
    ///
    /// # Errors
    ///
    /// Checked in order, each leaving the cache untouched: `NotFound`,
    /// `Unauthorized` unless `caller` is the current owner,
    /// `VersionMismatch` unless `provider_version` is current,
    /// `NotOffChain` for on-chain providers.
    pub fn write_check_result(
        &self,
        provider_id: ProviderId,
        provider_version: ProviderVersion,
        action_id: ActionId,
        expiry_bound: BlockHeight,
        result: CheckResult,
        caller: Address,
    ) -> Result<(), ComplianceError> {
        let record = self.registry.provider(provider_id)?;
        if record.owner != caller {
            tracing::warn!(
                provider_id = %provider_id,
                caller = %caller,
                "rejected check result from non-owner"
            );
            return Err(ComplianceError::Unauthorized {
                provider_id,
                caller,
            });
        }
        if record.version != provider_version {
            tracing::warn!(
                provider_id = %provider_id,
                current = %record.version,
                submitted = %provider_version,
                "rejected check result for stale provider version"
            );
            return Err(ComplianceError::VersionMismatch {
                provider_id,
                current: record.version,
                submitted: provider_version,
            });
        }
        if !record.is_off_chain() {
            return Err(ComplianceError::NotOffChain(provider_id));
        }

        let replaced = self.approvals.write(
            action_id,
            PendingApproval {
                result,
                expiry_bound,
                provider_id,
                provider_version,
                writer: caller,
                written_at: Timestamp::now(),
            },
        );
        tracing::info!(
            provider_id = %provider_id,
            action_id = %action_id,
            result = %result,
            expiry_bound = %expiry_bound,
            replaced = replaced.is_some(),
            "check result written"
        );
        metrics::counter!("tcs_check_results_written_total", "result" => result.as_str())
            .increment(1);
        self.events.append(Event::ComplianceCheckResultWritten {
            provider_id,
            action_id,
            check_result: result,
        });
        Ok(())
    }

    /// Non-consuming view of the approval pending for `action_id`.
    pub fn pending_approval(&self, action_id: &ActionId) -> Option<PendingApproval> {
        self.approvals.pending_approval(action_id)
    }

    /// Drop approvals whose bound has passed at the current height.
    ///
    /// Never changes the outcome of a later check: expired entries already
    /// read as deny.
    pub fn purge_expired(&self) -> usize {
        let removed = self.approvals.purge_expired(self.clock.current_height());
        if removed > 0 {
            tracing::debug!(removed, "purged expired approvals");
        }
        removed
    }

    /// Resolve `start` and its ancestors, root first.
    fn resolve_chain(&self, start: ProviderId) -> Result<Vec<ChainLink>, ComplianceError> {
        let max_depth = self.config.max_delegation_depth;
        let mut links = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(id) = next {
            if !visited.insert(id) {
                tracing::warn!(provider_id = %start, revisited = %id, "delegation cycle detected");
                return Err(ComplianceError::CycleDetected(id));
            }
            if links.len() > max_depth {
                tracing::warn!(provider_id = %start, max_depth, "delegation chain too deep");
                return Err(ComplianceError::DelegationTooDeep {
                    provider_id: start,
                    max_depth,
                });
            }
            let record = self.registry.provider(id)?;
            let evaluation = Evaluation::of(&record);
            next = evaluation.parent();
            links.push(ChainLink {
                provider_id: record.id,
                provider_version: record.version,
                evaluation,
            });
        }

        links.reverse();
        Ok(links)
    }

    /// Evaluate one link and record the attempt.
    fn evaluate(&self, link: &ChainLink, action: &Action) -> Result<CheckResult, ComplianceError> {
        let action_id = compute_action_hash(action)?;
        let result = match &link.evaluation {
            Evaluation::OnChainRule(rule) | Evaluation::Delegating { rule, .. } => {
                rule.check(action)
            }
            Evaluation::OffChainGate => self.consume_approval(&action_id),
        };

        tracing::debug!(
            provider_id = %link.provider_id,
            action_id = %action_id,
            kind = link.evaluation.kind(),
            result = %result,
            "compliance check performed"
        );
        metrics::counter!(
            "tcs_compliance_checks_total",
            "kind" => link.evaluation.kind(),
            "result" => result.as_str()
        )
        .increment(1);
        self.events.append(Event::ComplianceCheckPerformed {
            provider_id: link.provider_id,
            action_id,
            to: action.to,
            check_result: result,
        });
        Ok(result)
    }

    /// Take the pending approval for `action_id`, denying if there is none
    /// or it has expired.
    fn consume_approval(&self, action_id: &ActionId) -> CheckResult {
        let height = self.clock.current_height();
        match self.approvals.take(action_id, height) {
            Some(approval) => approval.result,
            None => CheckResult::Deny,
        }
    }
}

impl std::fmt::Debug for ComplianceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceCoordinator")
            .field("registry", &self.registry)
            .field("approvals", &self.approvals)
            .field("height", &self.clock.current_height())
            .field("config", &self.config)
            .finish()
    }
}
