//! # tcs-coordinator: Compliance Coordinator
//!
//! Mediates between instruments and compliance providers:
//!
//! - **ComplianceCoordinator** (`coordinator.rs`): action hashing,
//!   `perform_check` over on-chain rules, delegation chains and off-chain
//!   gates, and `write_check_result` for off-chain provider owners.
//! - **ApprovalCache** (`cache.rs`): single-use, height-bounded approvals
//!   keyed by action id.
//!
//! Every individual check is recorded as `ComplianceCheckPerformed` on the
//! shared [`EventLog`](tcs_core::EventLog). Counters
//! `tcs_compliance_checks_total{kind,result}` and
//! `tcs_check_results_written_total{result}` are emitted through `metrics`;
//! without an installed recorder they are no-ops.

pub mod cache;
pub mod coordinator;

pub use cache::{ApprovalCache, PendingApproval};
pub use coordinator::{ComplianceCoordinator, Evaluation};
