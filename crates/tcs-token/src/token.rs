//! # Compliance-Gated Token
//!
//! A fungible instrument bound to one compliance provider. Every transfer
//! is presented to the coordinator as an [`Action`] with aux code
//! `TRANSFER`; balances move only on `Permit`.
//!
//! ## Invariants
//!
//! - A denial leaves balances unchanged and emits no `Transfer` event. It
//!   is returned as a value, not an error.
//! - The balance check, the compliance check and the balance update run
//!   under one lock, so two transfers from the same account cannot both
//!   spend the same funds.
//! - Every balance fault is raised before the coordinator is consulted. A
//!   transfer that cannot be applied never consumes an approval or records
//!   a check.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tcs_core::{Action, ActionId, Address, AuxCode, CheckResult, Event, ProviderId};
use tcs_coordinator::ComplianceCoordinator;

use crate::error::TokenError;

/// A token that consults a compliance provider before moving balances.
pub struct ComplianceToken {
    address: Address,
    issuer: Address,
    provider_id: ProviderId,
    coordinator: Arc<ComplianceCoordinator>,
    balances: Mutex<HashMap<Address, u128>>,
}

impl ComplianceToken {
    /// A token at `address`, minted by `issuer`, gated by `provider_id`.
    pub fn new(
        address: Address,
        issuer: Address,
        provider_id: ProviderId,
        coordinator: Arc<ComplianceCoordinator>,
    ) -> Self {
        Self {
            address,
            issuer,
            provider_id,
            coordinator,
            balances: Mutex::new(HashMap::new()),
        }
    }

    /// The token's address, used as the action instrument.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The provider gating this token.
    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    /// Credit `amount` to `to`. Issuer only; not compliance-gated.
    pub fn mint(&self, to: Address, amount: u128, caller: Address) -> Result<u128, TokenError> {
        if caller != self.issuer {
            return Err(TokenError::NotIssuer { caller });
        }
        let mut balances = self.balances.lock();
        let balance = balances.entry(to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(TokenError::BalanceOverflow(to))?;
        tracing::debug!(token = %self.address, to = %to, amount, "minted");
        Ok(*balance)
    }

    /// Balance held by `account`.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.lock().get(account).copied().unwrap_or(0)
    }

    /// The exact action a transfer would present, pinned to the provider's
    /// current version. Oracles hash this to pre-compute the approval key.
    pub fn action_for(
        &self,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<Action, TokenError> {
        self.action_with(from, to, amount, AuxCode::TRANSFER)
    }

    /// Identifier of the action [`ComplianceToken::action_for`] returns.
    pub fn action_id_for(
        &self,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<ActionId, TokenError> {
        let action = self.action_for(from, to, amount)?;
        Ok(self.coordinator.compute_action_hash(&action)?)
    }

    /// Ask whether a transfer would be permitted, without moving funds.
    ///
    /// Presents the action with aux code `PRE_CHECK`, so it hashes
    /// differently from the transfer itself and cannot consume the
    /// transfer's off-chain approval.
    pub fn pre_check_transfer(
        &self,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<CheckResult, TokenError> {
        let action = self.action_with(from, to, amount, AuxCode::PRE_CHECK)?;
        Ok(self.coordinator.perform_check(&action)?)
    }

    /// Move `amount` from `from` to `to` if compliance permits.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` or `BalanceOverflow` before any check is made;
    /// any [`ComplianceError`](tcs_core::ComplianceError) the coordinator
    /// raises. A denial is `Ok(CheckResult::Deny)`.
    pub fn transfer(
        &self,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<CheckResult, TokenError> {
        let mut balances = self.balances.lock();
        let available = balances.get(&from).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account: from,
                available,
                requested: amount,
            });
        }

        // Self-transfers leave the balance untouched and cannot overflow.
        let credited = if from == to {
            None
        } else {
            let held = balances.get(&to).copied().unwrap_or(0);
            Some(held.checked_add(amount).ok_or(TokenError::BalanceOverflow(to))?)
        };

        let action = self.action_for(from, to, amount)?;
        let result = self.coordinator.perform_check(&action)?;
        if !result.is_permitted() {
            tracing::info!(
                token = %self.address,
                from = %from,
                to = %to,
                amount,
                "transfer denied by compliance"
            );
            return Ok(result);
        }

        if let Some(credited) = credited {
            balances.insert(from, available - amount);
            balances.insert(to, credited);
        }
        self.coordinator.events().append(Event::Transfer {
            instrument: self.address,
            from,
            to,
            amount,
        });
        tracing::debug!(
            token = %self.address,
            from = %from,
            to = %to,
            amount,
            "transfer completed"
        );
        Ok(result)
    }

    fn action_with(
        &self,
        from: Address,
        to: Address,
        amount: u128,
        aux_code: AuxCode,
    ) -> Result<Action, TokenError> {
        let version = self.coordinator.current_version(self.provider_id)?;
        Ok(Action::new(
            self.provider_id,
            version,
            self.address,
            amount,
            from,
            to,
            aux_code,
        ))
    }
}

impl std::fmt::Debug for ComplianceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceToken")
            .field("address", &self.address)
            .field("provider_id", &self.provider_id)
            .field("holders", &self.balances.lock().len())
            .finish()
    }
}
