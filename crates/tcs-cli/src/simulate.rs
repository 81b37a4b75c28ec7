//! # Simulate: run a scripted scenario against an in-memory engine.
//!
//! A scenario declares rules, tokens and a list of steps. The simulator
//! wires a registry, coordinator and manual block clock, replays the steps
//! in order and prints the resulting event log as JSON lines.
//!
//! ```yaml
//! start_height: 100
//! rules:
//!   - name: parent
//!     admin: deployer
//!   - name: child
//!     admin: deployer
//!     parent: parent
//!   - name: kyc
//!     admin: oracle
//!     owner: oracle
//!     off_chain: true
//! tokens:
//!   - name: usd
//!     issuer: deployer
//!     rule: child
//! steps:
//!   - op: mint
//!     token: usd
//!     to: alice
//!     amount: 100
//!     caller: deployer
//!   - op: allow
//!     rule: parent
//!     account: bob
//!     caller: deployer
//!   - op: transfer
//!     token: usd
//!     from: alice
//!     to: bob
//!     amount: 10
//!     expect: deny
//! ```
//!
//! Account fields take either a 0x-prefixed address or a name, which is
//! mapped to a stable address derived from it. Amounts cover the full
//! `u128` range; write values above `u64::MAX` as quoted decimal strings.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;
use tcs_coordinator::ComplianceCoordinator;
use tcs_core::{
    Address, BlockClock, BlockHeight, CheckResult, EngineConfig, EventLog, ManualClock,
    ProviderId,
};
use tcs_registry::ProviderRegistry;
use tcs_standard::WhitelistStandard;
use tcs_token::ComplianceToken;

use crate::config::load_config;

/// Blocks an approval stays usable when a step gives no `expires_in`.
const DEFAULT_APPROVAL_WINDOW: u64 = 10;

/// Arguments for `tcs simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Scenario file (YAML).
    pub scenario: PathBuf,

    /// Engine configuration file (YAML). Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// A scripted scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Block height the clock starts at.
    #[serde(default)]
    pub start_height: u64,
    /// Allow-list rules, registered in order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Tokens, created after every rule is registered.
    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
    /// Steps replayed in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }
}

/// An allow-list rule to register.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Name used by later references; also seeds the rule's address.
    pub name: String,
    /// Account allowed to edit the list.
    pub admin: String,
    /// Provider owner. Defaults to the rule's own address.
    #[serde(default)]
    pub owner: Option<String>,
    /// Name of an earlier rule this one delegates to.
    #[serde(default)]
    pub parent: Option<String>,
    /// Register as an off-chain provider.
    #[serde(default)]
    pub off_chain: bool,
    /// Opaque description.
    #[serde(default)]
    pub description: String,
}

/// A token to create.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSpec {
    /// Name used by later references; also seeds the token's address.
    pub name: String,
    /// Account allowed to mint.
    pub issuer: String,
    /// Rule gating the token.
    pub rule: String,
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Add an account to a rule's list.
    Allow {
        rule: String,
        account: String,
        caller: String,
    },
    /// Remove an account from a rule's list.
    Disallow {
        rule: String,
        account: String,
        caller: String,
    },
    /// Credit a balance.
    Mint {
        token: String,
        to: String,
        #[serde(with = "tcs_core::action::decimal_u128")]
        amount: u128,
        caller: String,
    },
    /// Attempt a transfer. `expect` (`permit` or `deny`) turns the outcome
    /// into an assertion.
    Transfer {
        token: String,
        from: String,
        to: String,
        #[serde(with = "tcs_core::action::decimal_u128")]
        amount: u128,
        #[serde(default)]
        expect: Option<String>,
    },
    /// Write an off-chain result for the action a token transfer would
    /// present to `rule`.
    WriteResult {
        rule: String,
        token: String,
        from: String,
        to: String,
        #[serde(with = "tcs_core::action::decimal_u128")]
        amount: u128,
        result: String,
        #[serde(default)]
        expires_in: Option<u64>,
        caller: String,
    },
    /// Move the clock forward.
    Advance { blocks: u64 },
    /// Publish a new revision of a rule's provider.
    Upgrade { rule: String, caller: String },
    /// Hand a rule's provider to a new owner.
    TransferOwnership {
        rule: String,
        new_owner: String,
        caller: String,
    },
    /// Drop expired approvals.
    Purge,
}

impl Step {
    fn op(&self) -> &'static str {
        match self {
            Self::Allow { .. } => "allow",
            Self::Disallow { .. } => "disallow",
            Self::Mint { .. } => "mint",
            Self::Transfer { .. } => "transfer",
            Self::WriteResult { .. } => "write_result",
            Self::Advance { .. } => "advance",
            Self::Upgrade { .. } => "upgrade",
            Self::TransferOwnership { .. } => "transfer_ownership",
            Self::Purge => "purge",
        }
    }
}

/// Resolve an account field: a 0x address, or a name.
pub fn resolve_account(value: &str) -> Result<Address> {
    if value.starts_with("0x") {
        value
            .parse()
            .with_context(|| format!("invalid address {value:?}"))
    } else {
        Ok(Address::from_seed(value))
    }
}

/// An in-memory deployment built from a scenario.
pub struct Simulation {
    clock: Arc<ManualClock>,
    registry: Arc<ProviderRegistry>,
    coordinator: Arc<ComplianceCoordinator>,
    rules: HashMap<String, (Arc<WhitelistStandard>, ProviderId)>,
    tokens: HashMap<String, ComplianceToken>,
}

impl Simulation {
    /// Register every rule and create every token.
    pub fn build(scenario: &Scenario, config: EngineConfig) -> Result<Self> {
        let events = Arc::new(EventLog::new(config.event_log_capacity));
        let registry = Arc::new(ProviderRegistry::new(events));
        let clock = Arc::new(ManualClock::new(BlockHeight(scenario.start_height)));
        let coordinator = Arc::new(ComplianceCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&clock) as Arc<dyn BlockClock>,
            config,
        ));

        let mut sim = Self {
            clock,
            registry,
            coordinator,
            rules: HashMap::new(),
            tokens: HashMap::new(),
        };
        for rule in &scenario.rules {
            sim.register_rule(rule)
                .with_context(|| format!("failed to register rule {:?}", rule.name))?;
        }
        for token_spec in &scenario.tokens {
            let (_, provider_id) = sim.rule(&token_spec.rule)?;
            let token = ComplianceToken::new(
                Address::from_seed(&token_spec.name),
                resolve_account(&token_spec.issuer)?,
                provider_id,
                Arc::clone(&sim.coordinator),
            );
            if sim.tokens.insert(token_spec.name.clone(), token).is_some() {
                bail!("duplicate token {:?}", token_spec.name);
            }
        }
        Ok(sim)
    }

    /// The coordinator driving this simulation.
    pub fn coordinator(&self) -> &Arc<ComplianceCoordinator> {
        &self.coordinator
    }

    /// Balance of `account` on the named token.
    pub fn balance_of(&self, token: &str, account: &str) -> Result<u128> {
        Ok(self.token(token)?.balance_of(&resolve_account(account)?))
    }

    /// Replay `steps` in order, stopping at the first failure.
    pub fn run(&self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step)
                .with_context(|| format!("step {} ({}) failed", index + 1, step.op()))?;
        }
        Ok(())
    }

    /// Write every retained event as one JSON object per line.
    pub fn write_events(&self, out: &mut impl Write) -> Result<()> {
        for record in self.coordinator.events().records() {
            let line = serde_json::to_string(&record).context("failed to serialize event")?;
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn register_rule(&mut self, rule: &RuleSpec) -> Result<()> {
        if self.rules.contains_key(&rule.name) {
            bail!("duplicate rule {:?}", rule.name);
        }
        let mut standard = WhitelistStandard::new(
            &self.registry,
            Address::from_seed(&rule.name),
            resolve_account(&rule.admin)?,
        );
        if let Some(owner) = &rule.owner {
            standard = standard.with_owner(resolve_account(owner)?);
        }
        if let Some(parent) = &rule.parent {
            let (_, parent_id) = self.rule(parent)?;
            standard = standard.with_parent(parent_id);
        }
        let standard = Arc::new(standard);
        let id = standard.register_provider(&rule.name, &rule.description, rule.off_chain)?;
        tracing::info!(
            rule = %rule.name,
            provider_id = %id,
            off_chain = rule.off_chain,
            "rule registered"
        );
        self.rules.insert(rule.name.clone(), (standard, id));
        Ok(())
    }

    fn rule(&self, name: &str) -> Result<(&Arc<WhitelistStandard>, ProviderId)> {
        self.rules
            .get(name)
            .map(|(standard, id)| (standard, *id))
            .with_context(|| format!("unknown rule {name:?}"))
    }

    fn token(&self, name: &str) -> Result<&ComplianceToken> {
        self.tokens
            .get(name)
            .with_context(|| format!("unknown token {name:?}"))
    }

    fn apply(&self, step: &Step) -> Result<()> {
        match step {
            Step::Allow {
                rule,
                account,
                caller,
            } => {
                let (standard, _) = self.rule(rule)?;
                standard.allow(resolve_account(account)?, resolve_account(caller)?)?;
            }
            Step::Disallow {
                rule,
                account,
                caller,
            } => {
                let (standard, _) = self.rule(rule)?;
                standard.disallow(resolve_account(account)?, resolve_account(caller)?)?;
            }
            Step::Mint {
                token,
                to,
                amount,
                caller,
            } => {
                self.token(token)?.mint(
                    resolve_account(to)?,
                    *amount,
                    resolve_account(caller)?,
                )?;
            }
            Step::Transfer {
                token,
                from,
                to,
                amount,
                expect,
            } => {
                let result = self.token(token)?.transfer(
                    resolve_account(from)?,
                    resolve_account(to)?,
                    *amount,
                )?;
                tracing::info!(
                    token = %token,
                    from = %from,
                    to = %to,
                    amount,
                    result = %result,
                    "transfer attempted"
                );
                if let Some(expected) = expect {
                    let expected: CheckResult = expected.parse()?;
                    if expected != result {
                        bail!("expected {expected}, got {result}");
                    }
                }
            }
            Step::WriteResult {
                rule,
                token,
                from,
                to,
                amount,
                result,
                expires_in,
                caller,
            } => {
                let (_, provider_id) = self.rule(rule)?;
                let version = self.coordinator.current_version(provider_id)?;
                let action = self
                    .token(token)?
                    .action_for(resolve_account(from)?, resolve_account(to)?, *amount)?
                    .for_provider(provider_id, version);
                let action_id = self.coordinator.compute_action_hash(&action)?;
                let expiry_bound = self
                    .clock
                    .current_height()
                    .plus(expires_in.unwrap_or(DEFAULT_APPROVAL_WINDOW));
                self.coordinator.write_check_result(
                    provider_id,
                    version,
                    action_id,
                    expiry_bound,
                    result.parse()?,
                    resolve_account(caller)?,
                )?;
            }
            Step::Advance { blocks } => {
                let height = self.clock.advance(*blocks);
                tracing::info!(height = %height, "clock advanced");
            }
            Step::Upgrade { rule, caller } => {
                let (_, provider_id) = self.rule(rule)?;
                self.registry
                    .upgrade_provider(provider_id, None, resolve_account(caller)?)?;
            }
            Step::TransferOwnership {
                rule,
                new_owner,
                caller,
            } => {
                let (_, provider_id) = self.rule(rule)?;
                self.registry.transfer_ownership(
                    provider_id,
                    resolve_account(new_owner)?,
                    resolve_account(caller)?,
                )?;
            }
            Step::Purge => {
                self.coordinator.purge_expired();
            }
        }
        Ok(())
    }
}

/// Execute `tcs simulate`.
pub fn run_simulate(args: &SimulateArgs, out: &mut impl Write) -> Result<u8> {
    let config = load_config(args.config.as_deref())?;
    let scenario = Scenario::load(&args.scenario)?;
    let sim = Simulation::build(&scenario, config)?;
    let outcome = sim.run(&scenario.steps);
    sim.write_events(out)?;
    outcome?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_core::Event;

    const TWO_LEVEL: &str = r#"
start_height: 100
rules:
  - name: parent
    admin: deployer
  - name: child
    admin: deployer
    parent: parent
tokens:
  - name: usd
    issuer: deployer
    rule: child
steps:
  - op: mint
    token: usd
    to: alice
    amount: 100
    caller: deployer
  - op: transfer
    token: usd
    from: alice
    to: bob
    amount: 10
    expect: deny
  - op: allow
    rule: parent
    account: bob
    caller: deployer
  - op: allow
    rule: child
    account: bob
    caller: deployer
  - op: transfer
    token: usd
    from: alice
    to: bob
    amount: 10
    expect: permit
"#;

    const OFF_CHAIN: &str = r#"
start_height: 50
rules:
  - name: kyc
    admin: oracle
    owner: oracle
    off_chain: true
tokens:
  - name: usd
    issuer: deployer
    rule: kyc
steps:
  - op: mint
    token: usd
    to: alice
    amount: 100
    caller: deployer
  - op: write_result
    rule: kyc
    token: usd
    from: alice
    to: bob
    amount: 40
    result: permit
    expires_in: 5
    caller: oracle
  - op: advance
    blocks: 6
  - op: transfer
    token: usd
    from: alice
    to: bob
    amount: 40
    expect: deny
  - op: write_result
    rule: kyc
    token: usd
    from: alice
    to: bob
    amount: 40
    result: permit
    caller: oracle
  - op: transfer
    token: usd
    from: alice
    to: bob
    amount: 40
    expect: permit
  - op: purge
"#;

    fn simulate(yaml: &str) -> Result<Simulation> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        let sim = Simulation::build(&scenario, EngineConfig::default())?;
        sim.run(&scenario.steps)?;
        Ok(sim)
    }

    #[test]
    fn two_level_scenario_runs() {
        let sim = simulate(TWO_LEVEL).unwrap();
        assert_eq!(sim.balance_of("usd", "bob").unwrap(), 10);
        assert_eq!(sim.balance_of("usd", "alice").unwrap(), 90);
        let checks = sim.coordinator().events().filter(Event::is_check);
        assert_eq!(checks.len(), 3);
    }

    #[test]
    fn off_chain_scenario_runs() {
        let sim = simulate(OFF_CHAIN).unwrap();
        assert_eq!(sim.balance_of("usd", "bob").unwrap(), 40);
        let written = sim
            .coordinator()
            .events()
            .filter(|e| matches!(e, Event::ComplianceCheckResultWritten { .. }));
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn failed_expectation_names_the_step() {
        let yaml = TWO_LEVEL.replace("expect: permit", "expect: deny");
        let err = simulate(&yaml).err().unwrap();
        assert!(format!("{err:#}").contains("step 5 (transfer)"));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let yaml = r#"
rules:
  - name: child
    admin: deployer
    parent: missing
"#;
        let err = simulate(yaml).err().unwrap();
        assert!(format!("{err:#}").contains("unknown rule \"missing\""));
    }

    #[test]
    fn non_admin_allow_fails() {
        let yaml = r#"
rules:
  - name: wl
    admin: deployer
steps:
  - op: allow
    rule: wl
    account: bob
    caller: mallory
"#;
        assert!(simulate(yaml).is_err());
    }

    #[test]
    fn amounts_beyond_u64_are_accepted() {
        let yaml = r#"
rules:
  - name: kyc
    admin: oracle
    owner: oracle
    off_chain: true
tokens:
  - name: usd
    issuer: deployer
    rule: kyc
steps:
  - op: mint
    token: usd
    to: alice
    amount: "340282366920938463463374607431768211455"
    caller: deployer
  - op: write_result
    rule: kyc
    token: usd
    from: alice
    to: bob
    amount: "100000000000000000000000"
    result: permit
    caller: oracle
  - op: transfer
    token: usd
    from: alice
    to: bob
    amount: "100000000000000000000000"
    expect: permit
"#;
        let sim = simulate(yaml).unwrap();
        let moved = 100_000_000_000_000_000_000_000u128;
        assert!(moved > u128::from(u64::MAX));
        assert_eq!(sim.balance_of("usd", "bob").unwrap(), moved);
        assert_eq!(sim.balance_of("usd", "alice").unwrap(), u128::MAX - moved);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let yaml = r#"
steps:
  - op: mint
    token: usd
    to: alice
    amount: -5
    caller: deployer
"#;
        assert!(serde_yaml::from_str::<Scenario>(yaml).is_err());
    }

    #[test]
    fn account_names_and_addresses_resolve() {
        let named = resolve_account("alice").unwrap();
        assert_eq!(named, Address::from_seed("alice"));
        assert_eq!(resolve_account(&named.to_string()).unwrap(), named);
        assert!(resolve_account("0xzz").is_err());
    }
}
