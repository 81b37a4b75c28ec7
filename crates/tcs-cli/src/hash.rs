//! # Action Hash: pre-compute an action id.
//!
//! Oracles serving an off-chain provider must know the exact id a token
//! will present before the transfer happens. This command computes it from
//! the action tuple without touching any engine state.
//!
//! ```bash
//! tcs action-hash --provider-id 3 --provider-version 1 \
//!     --instrument 0x... --amount 25 --from 0x... --to 0x...
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tcs_core::{compute_action_hash, Action, Address, AuxCode, ProviderId, ProviderVersion};

/// Arguments for `tcs action-hash`.
#[derive(Args, Debug)]
pub struct ActionHashArgs {
    /// Provider the action is addressed to.
    #[arg(long)]
    pub provider_id: u64,

    /// Provider version the action is pinned to.
    #[arg(long, default_value_t = 1)]
    pub provider_version: u32,

    /// Instrument (token) address, 0x-prefixed hex.
    #[arg(long)]
    pub instrument: Address,

    /// Amount, or token id for non-fungible instruments.
    #[arg(long)]
    pub amount: u128,

    /// Sender address.
    #[arg(long)]
    pub from: Address,

    /// Recipient address.
    #[arg(long)]
    pub to: Address,

    /// Action kind: 1 for a transfer, 0 for a pre-check.
    #[arg(long, default_value_t = 1)]
    pub aux_code: u32,

    /// Print the full action as JSON alongside the id.
    #[arg(long)]
    pub verbose_json: bool,
}

impl ActionHashArgs {
    /// The action tuple these arguments describe.
    pub fn action(&self) -> Action {
        Action::new(
            ProviderId(self.provider_id),
            ProviderVersion(self.provider_version),
            self.instrument,
            self.amount,
            self.from,
            self.to,
            AuxCode(self.aux_code),
        )
    }
}

/// Execute `tcs action-hash`.
pub fn run_action_hash(args: &ActionHashArgs, out: &mut impl Write) -> Result<u8> {
    let action = args.action();
    let action_id = compute_action_hash(&action).context("failed to hash action")?;
    if args.verbose_json {
        let line = serde_json::json!({
            "action_id": action_id,
            "action": action,
        });
        writeln!(out, "{line}")?;
    } else {
        writeln!(out, "{action_id}")?;
    }
    Ok(0)
}
