//! # Allow-List Standard
//!
//! Permits an action iff its `to` account is on the list. Optionally
//! delegates to a parent provider, in which case the parent must also
//! permit the action; the coordinator consults the parent first and skips
//! this rule entirely when the parent denies.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tcs_core::{Action, Address, CheckResult, ComplianceError, ComplianceRule, ProviderId};
use tcs_registry::ProviderRegistry;

use crate::standard::StandardCore;

/// An allow-list compliance rule.
#[derive(Debug)]
pub struct WhitelistStandard {
    core: StandardCore,
    parent: Option<ProviderId>,
    allowed: RwLock<BTreeSet<Address>>,
}

impl WhitelistStandard {
    /// A plain allow-list with no parent. `admin` maintains the list.
    pub fn new(registry: &Arc<ProviderRegistry>, address: Address, admin: Address) -> Self {
        Self {
            core: StandardCore::new(registry, address, admin),
            parent: None,
            allowed: RwLock::new(BTreeSet::new()),
        }
    }

    /// Require `parent`'s approval in addition to this list.
    pub fn with_parent(mut self, parent: ProviderId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Register the provider under `owner` instead of the instance address.
    pub fn with_owner(mut self, owner: Address) -> Self {
        self.core = self.core.with_owner(owner);
        self
    }

    /// Self-register into the registry. Fails with `AlreadyRegistered` when
    /// called twice on the same instance.
    pub fn register_provider(
        self: &Arc<Self>,
        name: &str,
        description: &str,
        is_off_chain: bool,
    ) -> Result<ProviderId, ComplianceError> {
        let rule: Arc<dyn ComplianceRule> = self.clone();
        let id = self.core.register(rule, name, description, is_off_chain)?;
        tracing::debug!(provider_id = %id, parent = ?self.parent, "allow-list standard registered");
        Ok(id)
    }

    /// The provider id, once registered.
    pub fn provider_id(&self) -> Option<ProviderId> {
        self.core.provider_id()
    }

    /// The principal that owns the provider.
    pub fn owner(&self) -> Address {
        self.core.owner()
    }

    /// Add `account` to the list. Admin only.
    pub fn allow(&self, account: Address, caller: Address) -> Result<(), ComplianceError> {
        self.core.require_admin(caller)?;
        self.allowed.write().insert(account);
        tracing::debug!(rule = %self.core.address(), account = %account, "account allowed");
        Ok(())
    }

    /// Remove `account` from the list. Admin only.
    pub fn disallow(&self, account: Address, caller: Address) -> Result<(), ComplianceError> {
        self.core.require_admin(caller)?;
        self.allowed.write().remove(&account);
        tracing::debug!(rule = %self.core.address(), account = %account, "account disallowed");
        Ok(())
    }

    /// Whether `account` is on the list.
    pub fn is_allowed(&self, account: &Address) -> bool {
        self.allowed.read().contains(account)
    }
}

impl ComplianceRule for WhitelistStandard {
    fn address(&self) -> Address {
        self.core.address()
    }

    fn parent(&self) -> Option<ProviderId> {
        self.parent
    }

    fn check(&self, action: &Action) -> CheckResult {
        if self.is_allowed(&action.to) {
            CheckResult::Permit
        } else {
            CheckResult::Deny
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_core::{AuxCode, Event, EventLog, ProviderVersion};

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new(Arc::new(EventLog::new(1_000))))
    }

    fn action_to(to: Address) -> Action {
        Action::new(
            ProviderId(1),
            ProviderVersion::INITIAL,
            Address::from_seed("token"),
            10,
            Address::from_seed("sender"),
            to,
            AuxCode::TRANSFER,
        )
    }

    #[test]
    fn registry_owner_is_the_standard_itself() {
        let reg = registry();
        let address = Address::from_seed("whitelist");
        let admin = Address::from_seed("admin");
        let standard = Arc::new(WhitelistStandard::new(&reg, address, admin));
        let id = standard.register_provider("Whitelist", "", false).unwrap();

        let records = reg.events().records();
        match &records[0].event {
            Event::ProviderInfoUpdate { owner, .. } => assert_eq!(*owner, address),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(reg.provider_owner(id).unwrap(), address);
        assert_eq!(standard.provider_id(), Some(id));
    }

    #[test]
    fn second_registration_fails() {
        let reg = registry();
        let standard = Arc::new(WhitelistStandard::new(
            &reg,
            Address::from_seed("whitelist"),
            Address::from_seed("admin"),
        ));
        let id = standard.register_provider("Whitelist", "", false).unwrap();
        let err = standard.register_provider("Whitelist", "", false).unwrap_err();
        assert!(matches!(err, ComplianceError::AlreadyRegistered(existing) if existing == id));
        assert_eq!(reg.provider_count(), 1);
    }

    #[test]
    fn configured_owner_receives_the_provider() {
        let reg = registry();
        let operator = Address::from_seed("operator");
        let standard = Arc::new(
            WhitelistStandard::new(&reg, Address::from_seed("wl"), operator)
                .with_owner(operator),
        );
        let id = standard.register_provider("Whitelist", "", false).unwrap();
        assert_eq!(reg.provider_owner(id).unwrap(), operator);
    }

    #[test]
    fn off_chain_registration_records_flag() {
        let reg = registry();
        let oracle = Address::from_seed("oracle");
        let standard = Arc::new(
            WhitelistStandard::new(&reg, Address::from_seed("gate"), oracle)
                .with_owner(oracle),
        );
        let id = standard.register_provider("KYC gate", "", true).unwrap();
        assert!(reg.is_off_chain(id).unwrap());
    }

    #[test]
    fn check_follows_membership() {
        let reg = registry();
        let admin = Address::from_seed("admin");
        let standard = WhitelistStandard::new(&reg, Address::from_seed("wl"), admin);
        let x = Address::from_seed("x");
        assert_eq!(standard.check(&action_to(x)), CheckResult::Deny);
        standard.allow(x, admin).unwrap();
        assert_eq!(standard.check(&action_to(x)), CheckResult::Permit);
        standard.disallow(x, admin).unwrap();
        assert_eq!(standard.check(&action_to(x)), CheckResult::Deny);
    }

    #[test]
    fn allow_is_admin_only() {
        let reg = registry();
        let standard = Arc::new(WhitelistStandard::new(
            &reg,
            Address::from_seed("wl"),
            Address::from_seed("admin"),
        ));
        let id = standard.register_provider("Whitelist", "", false).unwrap();
        let intruder = Address::from_seed("intruder");
        match standard.allow(intruder, intruder) {
            Err(ComplianceError::Unauthorized {
                provider_id,
                caller,
            }) => {
                assert_eq!(provider_id, id);
                assert_eq!(caller, intruder);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            standard.disallow(intruder, intruder),
            Err(ComplianceError::Unauthorized { .. })
        ));
        assert!(!standard.is_allowed(&intruder));
    }

    #[test]
    fn allow_before_registration_is_rejected() {
        let reg = registry();
        let address = Address::from_seed("wl");
        let standard = WhitelistStandard::new(&reg, address, Address::from_seed("admin"));
        let intruder = Address::from_seed("intruder");
        let err = standard.allow(intruder, intruder).unwrap_err();
        assert!(matches!(err, ComplianceError::NotRegistered(a) if a == address));
        assert!(!standard.is_allowed(&intruder));
    }

    #[test]
    fn standard_does_not_keep_the_registry_alive() {
        let reg = registry();
        let standard = Arc::new(WhitelistStandard::new(
            &reg,
            Address::from_seed("wl"),
            Address::from_seed("admin"),
        ));
        standard.register_provider("Whitelist", "", false).unwrap();
        let weak = Arc::downgrade(&reg);
        drop(reg);
        assert!(weak.upgrade().is_none());
        assert_eq!(Arc::strong_count(&standard), 1);
    }

    #[test]
    fn parent_is_declared() {
        let reg = registry();
        let standard = WhitelistStandard::new(
            &reg,
            Address::from_seed("child"),
            Address::from_seed("admin"),
        )
        .with_parent(ProviderId(5));
        assert_eq!(standard.parent(), Some(ProviderId(5)));
    }
}
