//! # tcs-standard: Compliance Rule Standards
//!
//! Provider-side logic. A standard self-registers into the
//! [`ProviderRegistry`](tcs_registry::ProviderRegistry) once, becoming the
//! owner of the new provider (or naming a configured owner), and then
//! answers [`ComplianceRule::check`](tcs_core::ComplianceRule::check) for
//! its local rule.
//!
//! - **StandardCore** (`standard.rs`): registration slot and admin checks
//!   shared by every standard.
//! - **WhitelistStandard** (`whitelist.rs`): allow-list rule with an
//!   optional parent provider.

pub mod standard;
pub mod whitelist;

pub use standard::StandardCore;
pub use whitelist::WhitelistStandard;
