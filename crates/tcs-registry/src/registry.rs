//! # Provider Registry
//!
//! Issues provider identities and records who owns them.
//!
//! ## Lifecycle
//!
//! ```text
//! register ──▶ (id, owner, v1) ──▶ transfer_ownership / update_info
//!                               ──▶ upgrade (v2, v3, ...)
//! ```
//!
//! Providers are never deleted. An id is a permanent reference: tokens and
//! delegating rules name providers by id, and `upgrade_provider` can swap the
//! rule behind an id while bumping its version.
//!
//! ## Security Invariant
//!
//! Owner-only operations compare the caller against the owner stored at the
//! moment of the call, under the same lock that performs the mutation. A
//! rejected call changes nothing and emits nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tcs_core::{
    Address, ComplianceError, ComplianceRule, Event, EventLog, ProviderId, ProviderVersion,
    Timestamp,
};

/// How a provider's decisions are produced.
#[derive(Clone)]
pub enum ProviderBinding {
    /// Decisions are computed synchronously by the bound rule.
    OnChain(Arc<dyn ComplianceRule>),
    /// Decisions are written ahead of time by the provider's owner.
    OffChain,
}

impl ProviderBinding {
    /// Whether this binding is off-chain.
    pub fn is_off_chain(&self) -> bool {
        matches!(self, Self::OffChain)
    }
}

impl std::fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnChain(rule) => f
                .debug_tuple("OnChain")
                .field(&rule.address())
                .finish(),
            Self::OffChain => f.write_str("OffChain"),
        }
    }
}

/// Everything the registry knows about one provider.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    /// Permanent identifier.
    pub id: ProviderId,
    /// Principal allowed to administer and attest for the provider.
    pub owner: Address,
    /// Opaque display name.
    pub name: String,
    /// Opaque description.
    pub description: String,
    /// Current revision.
    pub version: ProviderVersion,
    /// Rule handle or off-chain marker. The on/off-chain flag never changes.
    pub binding: ProviderBinding,
    /// When the provider was registered.
    pub registered_at: Timestamp,
}

impl ProviderRecord {
    /// Whether decisions for this provider are written off-chain.
    pub fn is_off_chain(&self) -> bool {
        self.binding.is_off_chain()
    }

    /// The bound rule, for on-chain providers.
    pub fn rule(&self) -> Option<&Arc<dyn ComplianceRule>> {
        match &self.binding {
            ProviderBinding::OnChain(rule) => Some(rule),
            ProviderBinding::OffChain => None,
        }
    }
}

struct RegistryState {
    providers: BTreeMap<ProviderId, ProviderRecord>,
    /// `None` once the id space is exhausted.
    next_id: Option<ProviderId>,
}

/// The provider registry. Create one per deployment and share it by `Arc`.
pub struct ProviderRegistry {
    state: RwLock<RegistryState>,
    events: Arc<EventLog>,
}

impl ProviderRegistry {
    /// Create an empty registry that records to `events`.
    pub fn new(events: Arc<EventLog>) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                providers: BTreeMap::new(),
                next_id: Some(ProviderId::FIRST),
            }),
            events,
        }
    }

    /// The event log this registry records to.
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Register a provider and return its newly allocated id.
    ///
    /// Emits `ProviderInfoUpdate { provider_id, owner }`.
    ///
    /// # Errors
    ///
    /// `IdOverflow` once every id has been issued.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        owner: Address,
        binding: ProviderBinding,
    ) -> Result<ProviderId, ComplianceError> {
        let mut state = self.state.write();
        let id = state
            .next_id
            .ok_or(ComplianceError::IdOverflow("provider id"))?;
        state.next_id = id.next();

        let record = ProviderRecord {
            id,
            owner,
            name: name.into(),
            description: description.into(),
            version: ProviderVersion::INITIAL,
            binding,
            registered_at: Timestamp::now(),
        };
        tracing::info!(
            provider_id = %id,
            owner = %owner,
            name = %record.name,
            off_chain = record.is_off_chain(),
            "provider registered"
        );
        state.providers.insert(id, record);
        self.events.append(Event::ProviderInfoUpdate {
            provider_id: id,
            owner,
        });
        Ok(id)
    }

    /// Current owner of a provider.
    pub fn provider_owner(&self, id: ProviderId) -> Result<Address, ComplianceError> {
        self.with_record(id, |r| r.owner)
    }

    /// Current version of a provider.
    pub fn current_version(&self, id: ProviderId) -> Result<ProviderVersion, ComplianceError> {
        self.with_record(id, |r| r.version)
    }

    /// Whether a provider is off-chain.
    pub fn is_off_chain(&self, id: ProviderId) -> Result<bool, ComplianceError> {
        self.with_record(id, ProviderRecord::is_off_chain)
    }

    /// Snapshot of a provider's record.
    pub fn provider(&self, id: ProviderId) -> Result<ProviderRecord, ComplianceError> {
        self.with_record(id, Clone::clone)
    }

    /// Number of providers ever registered.
    pub fn provider_count(&self) -> usize {
        self.state.read().providers.len()
    }

    /// Hand a provider to a new owner. Current owner only.
    pub fn transfer_ownership(
        &self,
        id: ProviderId,
        new_owner: Address,
        caller: Address,
    ) -> Result<(), ComplianceError> {
        self.mutate_owned(id, caller, |record| {
            tracing::info!(
                provider_id = %id,
                from = %record.owner,
                to = %new_owner,
                "provider ownership transferred"
            );
            record.owner = new_owner;
            Ok(())
        })
    }

    /// Replace a provider's name and description. Current owner only.
    pub fn update_provider_info(
        &self,
        id: ProviderId,
        name: impl Into<String>,
        description: impl Into<String>,
        caller: Address,
    ) -> Result<(), ComplianceError> {
        let name = name.into();
        let description = description.into();
        self.mutate_owned(id, caller, |record| {
            record.name = name;
            record.description = description;
            tracing::debug!(provider_id = %id, "provider info updated");
            Ok(())
        })
    }

    /// Publish a new revision of a provider. Current owner only.
    ///
    /// Bumps the version, which voids every pending off-chain approval
    /// pinned to the old one. For on-chain providers `rule` optionally
    /// replaces the bound logic; off-chain providers take no rule.
    ///
    /// # Errors
    ///
    /// `BindingMismatch` if a rule is supplied for an off-chain provider,
    /// `IdOverflow` if the version space is exhausted.
    pub fn upgrade_provider(
        &self,
        id: ProviderId,
        rule: Option<Arc<dyn ComplianceRule>>,
        caller: Address,
    ) -> Result<ProviderVersion, ComplianceError> {
        let mut upgraded = ProviderVersion::INITIAL;
        self.mutate_owned(id, caller, |record| {
            if rule.is_some() && record.is_off_chain() {
                return Err(ComplianceError::BindingMismatch(id));
            }
            let next = record
                .version
                .next()
                .ok_or(ComplianceError::IdOverflow("provider version"))?;
            if let Some(rule) = rule {
                record.binding = ProviderBinding::OnChain(rule);
            }
            tracing::info!(
                provider_id = %id,
                from = %record.version,
                to = %next,
                "provider upgraded"
            );
            record.version = next;
            upgraded = next;
            Ok(())
        })?;
        Ok(upgraded)
    }

    fn with_record<T>(
        &self,
        id: ProviderId,
        f: impl FnOnce(&ProviderRecord) -> T,
    ) -> Result<T, ComplianceError> {
        let state = self.state.read();
        state
            .providers
            .get(&id)
            .map(f)
            .ok_or(ComplianceError::NotFound(id))
    }

    /// Run an owner-only mutation and emit `ProviderInfoUpdate` on success.
    ///
    /// The closure sees the record under the write lock; if it fails the
    /// record is left as it was.
    fn mutate_owned(
        &self,
        id: ProviderId,
        caller: Address,
        f: impl FnOnce(&mut ProviderRecord) -> Result<(), ComplianceError>,
    ) -> Result<(), ComplianceError> {
        let mut state = self.state.write();
        let record = state
            .providers
            .get_mut(&id)
            .ok_or(ComplianceError::NotFound(id))?;
        if record.owner != caller {
            tracing::warn!(
                provider_id = %id,
                caller = %caller,
                "rejected provider administration by non-owner"
            );
            return Err(ComplianceError::Unauthorized {
                provider_id: id,
                caller,
            });
        }
        let mut staged = record.clone();
        f(&mut staged)?;
        let owner = staged.owner;
        *record = staged;
        self.events.append(Event::ProviderInfoUpdate {
            provider_id: id,
            owner,
        });
        Ok(())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_count())
            .finish()
    }
}
