//! Token faults. A compliance denial is not among them.

use tcs_core::{Address, ComplianceError};
use thiserror::Error;

/// Errors raised by [`ComplianceToken`](crate::ComplianceToken).
#[derive(Error, Debug)]
pub enum TokenError {
    /// The engine could not evaluate the action.
    #[error(transparent)]
    Compliance(#[from] ComplianceError),

    /// Sender holds less than the requested amount.
    #[error("account {account} holds {available}, requested {requested}")]
    InsufficientBalance {
        /// The sender.
        account: Address,
        /// Its balance.
        available: u128,
        /// The requested amount.
        requested: u128,
    },

    /// Mint attempted by someone other than the issuer.
    #[error("caller {caller} is not the token issuer")]
    NotIssuer {
        /// The rejected caller.
        caller: Address,
    },

    /// Crediting would overflow the account's balance.
    #[error("balance of {0} would overflow")]
    BalanceOverflow(Address),
}
