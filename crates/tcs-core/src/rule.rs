//! # The Provider Rule Contract
//!
//! Every on-chain provider is backed by a [`ComplianceRule`]. The registry
//! stores the rule handle; the coordinator calls it. A rule never calls
//! back into the coordinator: delegation is declared through
//! [`ComplianceRule::parent`] and walked by the coordinator, so each parent
//! consultation is recorded and guarded in one place.

use crate::action::Action;
use crate::decision::CheckResult;
use crate::identity::{Address, ProviderId};

/// A synchronous compliance rule.
pub trait ComplianceRule: Send + Sync {
    /// Address of the rule instance. This is the principal that owns the
    /// provider when the rule registers itself.
    fn address(&self) -> Address;

    /// Provider whose approval is required in addition to this rule.
    fn parent(&self) -> Option<ProviderId> {
        None
    }

    /// Evaluate the local rule only. Parent approval is not considered here.
    fn check(&self, action: &Action) -> CheckResult;
}
