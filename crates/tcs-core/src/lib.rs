//! # tcs-core: Foundational Types for the Transfer Compliance Stack
//!
//! Every other crate in the workspace depends on `tcs-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtypes for every identifier.** `Address`, `ProviderId`,
//!    `ProviderVersion`, `ActionId`, `AuxCode`, `BlockHeight`. No bare
//!    integers or strings cross a crate boundary.
//!
//! 2. **One hashing path.** Action identifiers and audit digests are computed
//!    from `CanonicalBytes` (RFC 8785 JSON) through `sha256_digest()`. An
//!    oracle off-line and the coordinator at check time derive the same id.
//!
//! 3. **Denial is a value, not an error.** `CheckResult` carries compliance
//!    outcomes; `ComplianceError` is reserved for requests the engine cannot
//!    evaluate or accept.
//!
//! 4. **One audit surface.** Components append to a shared `EventLog`; the
//!    engine never reads it back.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod action;
pub mod canonical;
pub mod config;
pub mod decision;
pub mod digest;
pub mod error;
pub mod events;
pub mod identity;
pub mod rule;
pub mod temporal;

pub use action::{compute_action_hash, Action, ActionId, AuxCode};
pub use canonical::CanonicalBytes;
pub use config::EngineConfig;
pub use decision::CheckResult;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ComplianceError};
pub use events::{Event, EventLog, EventRecord};
pub use identity::{Address, ProviderId, ProviderVersion};
pub use rule::ComplianceRule;
pub use temporal::{BlockClock, BlockHeight, ManualClock, Timestamp};
