//! # tcs-token: Reference Compliance Token
//!
//! A minimal fungible token showing how an instrument integrates with the
//! [`ComplianceCoordinator`](tcs_coordinator::ComplianceCoordinator): it
//! builds the action tuple, treats `Deny` as "do not move balances" and
//! propagates only genuine faults as errors.

pub mod error;
pub mod token;

pub use error::TokenError;
pub use token::ComplianceToken;
