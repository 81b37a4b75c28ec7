//! # Error Types
//!
//! The engine's fault taxonomy. Every variant is a precondition violation
//! detected synchronously at the point of call; the operation that returns
//! it has changed no state.
//!
//! A compliance *denial* is not represented here. Denial is a normal
//! [`CheckResult`](crate::CheckResult) value; these errors mean the engine
//! could not evaluate or could not accept the request at all.

use thiserror::Error;

use crate::identity::{Address, ProviderId, ProviderVersion};

/// Faults raised by the registry, the rule standards and the coordinator.
#[derive(Error, Debug)]
pub enum ComplianceError {
    /// Reference to a provider id that was never registered.
    #[error("provider {0} is not registered")]
    NotFound(ProviderId),

    /// Caller is not the provider's current owner, or not the admin of the
    /// rule instance registered as that provider.
    #[error("caller {caller} is not authorized for provider {provider_id}")]
    Unauthorized {
        /// The provider the caller tried to administer.
        provider_id: ProviderId,
        /// The rejected caller.
        caller: Address,
    },

    /// A rule instance was administered before it registered a provider.
    #[error("rule instance {0} has not registered a provider")]
    NotRegistered(Address),

    /// The registry a rule instance was built against has been dropped.
    #[error("registry for rule instance {0} is no longer available")]
    RegistryUnavailable(Address),

    /// Submitted provider version is not the provider's current version.
    #[error("provider {provider_id} is at {current}, submitted {submitted}")]
    VersionMismatch {
        /// The provider written against.
        provider_id: ProviderId,
        /// The provider's current version.
        current: ProviderVersion,
        /// The version carried by the request.
        submitted: ProviderVersion,
    },

    /// A rule instance attempted to self-register a second time.
    #[error("rule instance is already registered as provider {0}")]
    AlreadyRegistered(ProviderId),

    /// The provider id or version space is exhausted.
    #[error("identifier space exhausted: {0}")]
    IdOverflow(&'static str),

    /// A provider reappeared in its own delegation chain.
    #[error("delegation cycle detected at provider {0}")]
    CycleDetected(ProviderId),

    /// The delegation chain exceeds the configured depth bound.
    #[error("delegation chain from provider {provider_id} exceeds depth {max_depth}")]
    DelegationTooDeep {
        /// The provider whose chain was being resolved.
        provider_id: ProviderId,
        /// The configured bound.
        max_depth: usize,
    },

    /// An off-chain result was written for an on-chain provider.
    #[error("provider {0} is evaluated on-chain and does not accept written results")]
    NotOffChain(ProviderId),

    /// A rule binding does not fit the provider's on/off-chain flag.
    #[error("rule binding does not match provider {0}")]
    BindingMismatch(ProviderId),

    /// Malformed caller input (addresses, digests, codes).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Canonical serialization of a digest preimage failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error(
        "float values are not permitted in canonical representations; \
         use string or integer for amount: {0}"
    )]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
