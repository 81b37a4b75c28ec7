//! # tcs-cli: Transfer Compliance Stack CLI
//!
//! Subcommand handlers for the `tcs` binary. Each handler takes its parsed
//! arguments and an output sink and returns an exit code, so the binary
//! stays a thin dispatcher and the handlers are testable in-process.

pub mod config;
pub mod hash;
pub mod simulate;
