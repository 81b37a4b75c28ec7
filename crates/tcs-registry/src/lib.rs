//! # tcs-registry: Provider Registry
//!
//! The leaf component of the engine: sequential provider identities, each
//! with an owner, opaque metadata, an immutable on/off-chain flag, a
//! revision counter and, for on-chain providers, the bound rule.
//!
//! One `ProviderRegistry` is created per deployment and handed by `Arc` to
//! the coordinator and to every rule standard; there is no global state.

pub mod registry;

pub use registry::{ProviderBinding, ProviderRecord, ProviderRegistry};
