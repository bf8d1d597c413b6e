//! Simulator configuration

use crate::logging::LogFormat;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use sim_core::{parse_balance, Account, Address, Balance, Ledger};
use sim_vm::{InvariantPolicy, ScriptConfig};
use std::collections::BTreeSet;
use std::path::Path;

/// Simulator settings, every field optional in the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of external accounts, addressed `#1..=#accounts`
    pub accounts: u64,
    /// Starting balance of every external account, as a decimal string
    pub initial_balance: String,
    /// Ballot chair person and auction beneficiary
    pub chair: u64,
    /// Ballot proposal names
    pub proposals: Vec<String>,
    /// Calls generated by the random workload
    pub calls: usize,
    /// Worker threads submitting the random workload
    pub threads: usize,
    /// Workload RNG seed
    pub seed: u64,
    pub log_level: String,
    pub log_format: LogFormat,
    pub invariant_policy: InvariantPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            accounts: 10,
            initial_balance: "1000".to_string(),
            chair: 1,
            proposals: vec!["dem".into(), "rep".into(), "ronpaul".into()],
            calls: 1000,
            threads: 4,
            seed: 42,
            log_level: "info".to_string(),
            log_format: LogFormat::Human,
            invariant_policy: InvariantPolicy::Abort,
        }
    }
}

impl SimConfig {
    /// Parse settings from TOML
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("Failed to parse simulator config")
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.accounts < 2 {
            bail!("at least 2 accounts are required, got {}", self.accounts);
        }
        if self.chair == 0 || self.chair > self.accounts {
            bail!("chair #{} is not one of the {} accounts", self.chair, self.accounts);
        }
        if self.proposals.is_empty() {
            bail!("at least one proposal is required");
        }
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.proposals.iter().find(|name| !seen.insert(name.as_str())) {
            bail!("duplicate proposal name {:?}", duplicate);
        }
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        self.initial_balance()?;
        Ok(())
    }

    /// Parsed starting balance
    pub fn initial_balance(&self) -> anyhow::Result<Balance> {
        parse_balance(&self.initial_balance)
            .with_context(|| format!("invalid initial_balance {:?}", self.initial_balance))
    }

    pub fn chair(&self) -> Address {
        Address::new(self.chair)
    }

    /// External account addresses
    pub fn addresses(&self) -> impl Iterator<Item = Address> {
        (1..=self.accounts).map(Address::new)
    }

    /// Contract accounts are placed after the external ones
    pub fn contract_address(&self, slot: u64) -> Address {
        Address::new(self.accounts + 1 + slot)
    }

    /// Genesis ledger: the external accounts plus `contracts` contract accounts
    pub fn genesis(&self, contracts: u64) -> anyhow::Result<Ledger> {
        let balance = self.initial_balance()?;
        let external = self
            .addresses()
            .map(|address| Account::external(address).with_balance(balance.clone()));
        let contract = (0..contracts).map(|slot| Account::contract(self.contract_address(slot)));
        Ok(Ledger::genesis(external.chain(contract))?)
    }

    pub fn script_config(&self) -> ScriptConfig {
        ScriptConfig::with_policy(self.invariant_policy)
    }
}
