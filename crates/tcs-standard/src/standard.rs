//! # Standard Registration
//!
//! State shared by every rule standard: the registry handle, the instance
//! address, the principal that will own the provider, and the provider id
//! once registered.
//!
//! The registry holds each on-chain rule strongly, so the standard keeps only
//! a [`Weak`] handle back to the registry. Dropping the last registry handle
//! frees both.
//!
//! A standard registers itself exactly once. The id slot is checked and
//! filled under one lock, so two concurrent registrations of the same
//! instance cannot both succeed.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tcs_core::{Address, ComplianceError, ComplianceRule, ProviderId};
use tcs_registry::{ProviderBinding, ProviderRegistry};

/// Registration state embedded in a rule standard.
pub struct StandardCore {
    registry: Weak<ProviderRegistry>,
    address: Address,
    owner: Address,
    admin: Address,
    provider_id: Mutex<Option<ProviderId>>,
}

impl StandardCore {
    /// A core whose provider will be owned by the instance itself.
    pub fn new(registry: &Arc<ProviderRegistry>, address: Address, admin: Address) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            address,
            owner: address,
            admin,
            provider_id: Mutex::new(None),
        }
    }

    /// Register the provider under `owner` instead of the instance address.
    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = owner;
        self
    }

    /// The instance address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The principal that owns (or will own) the provider.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The principal allowed to administer the local rule.
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// The registry this standard registers into, while it is alive.
    pub fn registry(&self) -> Option<Arc<ProviderRegistry>> {
        self.registry.upgrade()
    }

    /// The provider id, once registered.
    pub fn provider_id(&self) -> Option<ProviderId> {
        *self.provider_id.lock()
    }

    /// Register `rule` as a provider. Fails with `AlreadyRegistered` on the
    /// second call and `RegistryUnavailable` once the registry is gone.
    pub fn register(
        &self,
        rule: Arc<dyn ComplianceRule>,
        name: &str,
        description: &str,
        is_off_chain: bool,
    ) -> Result<ProviderId, ComplianceError> {
        let mut slot = self.provider_id.lock();
        if let Some(existing) = *slot {
            return Err(ComplianceError::AlreadyRegistered(existing));
        }
        let binding = if is_off_chain {
            ProviderBinding::OffChain
        } else {
            ProviderBinding::OnChain(rule)
        };
        let registry = self
            .registry
            .upgrade()
            .ok_or(ComplianceError::RegistryUnavailable(self.address))?;
        let id = registry.register_provider(name, description, self.owner, binding)?;
        *slot = Some(id);
        Ok(id)
    }

    /// Fail unless `caller` is the admin. A rejected caller gets
    /// `Unauthorized` naming the registered provider, or `NotRegistered`
    /// before registration.
    pub fn require_admin(&self, caller: Address) -> Result<(), ComplianceError> {
        if caller == self.admin {
            return Ok(());
        }
        match self.provider_id() {
            Some(provider_id) => Err(ComplianceError::Unauthorized {
                provider_id,
                caller,
            }),
            None => Err(ComplianceError::NotRegistered(self.address)),
        }
    }
}

impl std::fmt::Debug for StandardCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardCore")
            .field("address", &self.address)
            .field("owner", &self.owner)
            .field("provider_id", &self.provider_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_core::{Action, CheckResult, EventLog};

    struct Permissive(Address);

    impl ComplianceRule for Permissive {
        fn address(&self) -> Address {
            self.0
        }

        fn parent(&self) -> Option<ProviderId> {
            None
        }

        fn check(&self, _action: &Action) -> CheckResult {
            CheckResult::Permit
        }
    }

    fn rule() -> Arc<dyn ComplianceRule> {
        Arc::new(Permissive(Address::from_seed("rule")))
    }

    fn registry() -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::new(Arc::new(EventLog::new(100))))
    }

    fn standard_core(registry: &Arc<ProviderRegistry>) -> StandardCore {
        StandardCore::new(registry, Address::from_seed("rule"), Address::from_seed("admin"))
    }

    #[test]
    fn registry_is_freed_with_its_last_handle() {
        let registry = registry();
        let core = standard_core(&registry);
        core.register(rule(), "permissive", "", false).unwrap();
        let weak = Arc::downgrade(&registry);
        drop(registry);
        assert!(weak.upgrade().is_none());
        assert!(core.registry().is_none());
    }

    #[test]
    fn register_after_registry_dropped_fails() {
        let registry = registry();
        let core = standard_core(&registry);
        drop(registry);
        let err = core.register(rule(), "permissive", "", false).unwrap_err();
        assert!(matches!(
            err,
            ComplianceError::RegistryUnavailable(a) if a == Address::from_seed("rule")
        ));
        assert_eq!(core.provider_id(), None);
    }

    #[test]
    fn non_admin_is_rejected_with_provider_context() {
        let registry = registry();
        let admin = Address::from_seed("admin");
        let intruder = Address::from_seed("intruder");
        let core = standard_core(&registry);
        assert!(matches!(
            core.require_admin(intruder),
            Err(ComplianceError::NotRegistered(_))
        ));
        let id = core.register(rule(), "permissive", "", false).unwrap();
        match core.require_admin(intruder) {
            Err(ComplianceError::Unauthorized { provider_id, caller }) => {
                assert_eq!(provider_id, id);
                assert_eq!(caller, intruder);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(core.require_admin(admin).is_ok());
    }
}
