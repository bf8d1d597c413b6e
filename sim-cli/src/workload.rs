//! Seeded random workload against one shared ballot
//!
//! Each worker owns an RNG derived from the configured seed and submits
//! its share of calls straight into the shared script, so calls from
//! different workers interleave in whatever order the lock grants.

use crate::config::SimConfig;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use sim_contracts::{Ballot, Contract};
use sim_core::{Address, CallContext, Message};
use sim_vm::{CallOutcome, CallStatus, FunctionCall, Script};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize)]
pub struct WorkloadSummary {
    pub seed: u64,
    pub threads: usize,
    pub calls: usize,
    pub completed: usize,
    pub reverted: usize,
    pub skipped: usize,
    pub fatal: usize,
    pub aborted: bool,
    pub total_votes: u64,
    pub winner: String,
    pub supply_before: String,
    pub supply_after: String,
    pub supply_conserved: bool,
    pub invariants_hold: bool,
    pub state_root: String,
}

impl WorkloadSummary {
    pub fn passed(&self) -> bool {
        self.supply_conserved && self.invariants_hold && self.fatal == 0
    }

    fn record(&mut self, outcome: &CallOutcome) {
        match outcome.status {
            CallStatus::Completed(_) => self.completed += 1,
            CallStatus::Reverted(_) => self.reverted += 1,
            CallStatus::Skipped => self.skipped += 1,
        }
        if outcome.is_fatal() {
            self.fatal += 1;
        }
    }
}

struct CallGenerator<'a> {
    config: &'a SimConfig,
    ballot: &'a Arc<Ballot>,
    rng: StdRng,
}

impl CallGenerator<'_> {
    fn account(&mut self) -> Address {
        Address::new(self.rng.random_range(1..=self.config.accounts))
    }

    fn next_call(&mut self) -> FunctionCall {
        match self.rng.random_range(0..4u8) {
            0 => {
                // the chair most of the time, an intruder otherwise
                let sender = if self.rng.random_bool(0.8) {
                    self.config.chair()
                } else {
                    self.account()
                };
                let voter = self.account();
                self.ballot.give_right_to_vote_call(sender, voter)
            }
            1 => {
                let sender = self.account();
                let to = self.account();
                self.ballot.delegate_call(sender, to)
            }
            2 => {
                let sender = self.account();
                // one past the end exercises the range check
                let proposal = self.rng.random_range(0..=self.config.proposals.len());
                self.ballot.vote_call(sender, proposal)
            }
            _ => {
                let sender = self.account();
                let recipient = self.account();
                let value = self.rng.random_range(0..=100u64);
                FunctionCall::transfer(sender, recipient, value)
            }
        }
    }
}

/// Number of calls worker `index` submits
fn share(total: usize, workers: usize, index: usize) -> usize {
    total / workers + usize::from(index < total % workers)
}

/// Run the random workload and check conservation and ballot invariants
pub fn run_random(config: &SimConfig) -> anyhow::Result<WorkloadSummary> {
    let ledger = config.genesis(1)?;
    let supply_before = ledger.total_supply();
    let initial = CallContext::new(Message::from_sender(config.chair(), 0), ledger);

    let ballot = Arc::new(
        Ballot::new(&initial, config.contract_address(0), config.proposals.clone())
            .context("Failed to create ballot")?,
    );
    let script = Script::new(&initial, config.script_config());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("Failed to build worker pool")?;

    info!(
        "Running {} random calls on {} threads, seed {}",
        config.calls, config.threads, config.seed
    );

    let outcomes: Vec<Vec<CallOutcome>> = pool.install(|| {
        (0..config.threads)
            .into_par_iter()
            .map(|index| {
                let mut generator = CallGenerator {
                    config,
                    ballot: &ballot,
                    rng: StdRng::seed_from_u64(config.seed.wrapping_add(index as u64)),
                };
                let count = share(config.calls, config.threads, index);
                debug!("Worker {} submitting {} calls", index, count);
                (0..count)
                    .map(|_| script.submit(generator.next_call()))
                    .collect()
            })
            .collect()
    });

    let mut summary = WorkloadSummary {
        seed: config.seed,
        threads: config.threads,
        calls: config.calls,
        ..WorkloadSummary::default()
    };
    for outcome in outcomes.iter().flatten() {
        summary.record(outcome);
    }

    let ledger = script.ledger();
    let supply_after = ledger.total_supply();
    summary.aborted = script.is_halted();
    summary.total_votes = ballot.total_votes();
    summary.winner = ballot.winner_name();
    summary.supply_conserved = supply_after == supply_before && ledger.verify().is_ok();
    summary.supply_before = supply_before.to_string();
    summary.supply_after = supply_after.to_string();
    summary.invariants_hold = ballot.check_invariants(&ledger).is_ok();
    summary.state_root = ledger.state_root().to_hex();

    info!(
        "Workload done: {} completed, {} reverted, invariants hold: {}",
        summary.completed, summary.reverted, summary.invariants_hold
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threads: usize, calls: usize) -> SimConfig {
        SimConfig {
            threads,
            calls,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_share_covers_all_calls() {
        let total: usize = (0..3).map(|i| share(10, 3, i)).sum();
        assert_eq!(total, 10);
        assert_eq!(share(10, 3, 0), 4);
        assert_eq!(share(10, 3, 2), 3);
    }

    #[test]
    fn test_single_thread_run_passes() {
        let summary = run_random(&config(1, 300)).unwrap();
        assert_eq!(summary.completed + summary.reverted + summary.skipped, 300);
        assert!(summary.passed());
        assert!(summary.total_votes <= SimConfig::default().accounts);
    }

    #[test]
    fn test_single_thread_run_is_deterministic() {
        let first = run_random(&config(1, 200)).unwrap();
        let second = run_random(&config(1, 200)).unwrap();
        assert_eq!(first.state_root, second.state_root);
        assert_eq!(first.total_votes, second.total_votes);
    }

    #[test]
    fn test_concurrent_run_passes() {
        let summary = run_random(&config(4, 1000)).unwrap();
        assert_eq!(summary.completed + summary.reverted + summary.skipped, 1000);
        assert!(summary.passed());
        assert!(!summary.aborted);
    }
}
