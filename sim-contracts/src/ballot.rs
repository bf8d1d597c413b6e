//! Weighted-delegation ballot
//!
//! The chair person hands out voting rights, voters either vote for a
//! proposal directly or delegate their weight to another voter. There is
//! no explicit phase: the voter records are the whole state machine.
//!
//! # Weight flow
//!
//! Delegation resolves the target through the chain of existing
//! delegations to its final, non-delegating voter. If that voter has not
//! voted yet its weight grows by the caller's weight. If it already voted,
//! the caller's weight goes straight into the chosen proposal's count and
//! is remembered on the voter as `forwarded`. This keeps the tally exactly
//! checkable from storage:
//!
//! ```text
//! count[p] = Σ (weight + forwarded) over voters who voted directly for p
//! ```
//!
//! # Tie-break
//!
//! [`Ballot::winning_proposal`] returns the highest index among the
//! proposals sharing the maximum vote count.

use crate::contract::{ensure, Contract};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sim_core::{Address, CallContext, Ledger, Returned};
use sim_vm::{only_sender, FunctionCall, Guard, VmError, VmResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Voter record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Voter address
    pub address: Address,
    /// Voting weight, including weight absorbed from delegators
    pub weight: u64,
    /// Voter this one delegated to
    pub delegate: Option<Address>,
    /// Proposal voted for directly
    pub vote: Option<usize>,
    /// Weight delegated to this voter after it had voted
    pub forwarded: u64,
}

impl Voter {
    /// Fresh voter without rights
    pub fn new(address: Address) -> Self {
        Self {
            address,
            weight: 0,
            delegate: None,
            vote: None,
            forwarded: 0,
        }
    }

    /// Voted for a proposal itself
    pub fn voted_directly(&self) -> bool {
        self.vote.is_some()
    }

    /// Handed its vote to another voter
    pub fn voted_by_delegation(&self) -> bool {
        self.delegate.is_some()
    }

    /// Voted either way
    pub fn voted(&self) -> bool {
        self.voted_directly() || self.voted_by_delegation()
    }
}

/// Proposal and its running tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal name, unique within the ballot
    pub name: String,
    /// Accumulated vote weight
    pub vote_count: u64,
}

#[derive(Debug)]
struct BallotStorage {
    proposals: Vec<Proposal>,
    voters: BTreeMap<Address, Voter>,
}

impl BallotStorage {
    fn voter(&self, address: &Address) -> Voter {
        self.voters
            .get(address)
            .cloned()
            .unwrap_or_else(|| Voter::new(*address))
    }

    fn give_right_to_vote(&mut self, address: Address) {
        let voter = self
            .voters
            .entry(address)
            .or_insert_with(|| Voter::new(address));
        if voter.voted() {
            // raising a voted weight would desync the tally
            debug!("{} already voted, weight left at {}", address, voter.weight);
            return;
        }
        voter.weight = voter.weight.max(1);
    }

    /// Follow delegations from `to` to the voter who will cast the vote
    fn resolve_delegate(&self, sender: Address, to: Address) -> VmResult<Address> {
        let mut visited = BTreeSet::from([sender]);
        let mut current = to;
        loop {
            if !visited.insert(current) {
                let reason = if current == sender {
                    format!("delegation from {} to {} loops back to the caller", sender, to)
                } else {
                    format!("delegation chain from {} cycles at {}", to, current)
                };
                return Err(VmError::Precondition(reason));
            }
            match self.voters.get(&current).and_then(|voter| voter.delegate) {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
    }

    fn delegate(&mut self, sender: Address, to: Address) -> VmResult<Address> {
        let caller = self.voter(&sender);
        if caller.voted() {
            return Err(VmError::Precondition(format!("{} already voted", sender)));
        }
        let target = self.resolve_delegate(sender, to)?;

        let weight = caller.weight;
        let final_voter = self
            .voters
            .entry(target)
            .or_insert_with(|| Voter::new(target));
        match final_voter.vote {
            Some(index) => {
                final_voter.forwarded += weight;
                self.proposals[index].vote_count += weight;
            }
            None => final_voter.weight += weight,
        }

        self.voters.insert(
            sender,
            Voter {
                delegate: Some(target),
                ..caller
            },
        );
        Ok(target)
    }

    fn vote(&mut self, sender: Address, proposal: usize) -> VmResult<bool> {
        if proposal >= self.proposals.len() {
            return Err(VmError::Precondition(format!(
                "proposal index {} out of range (0..{})",
                proposal,
                self.proposals.len()
            )));
        }
        if self.voters.get(&sender).is_some_and(Voter::voted) {
            return Ok(false);
        }

        let voter = self
            .voters
            .entry(sender)
            .or_insert_with(|| Voter::new(sender));
        voter.vote = Some(proposal);
        self.proposals[proposal].vote_count += voter.weight;
        Ok(true)
    }

    fn winning_proposal(&self) -> usize {
        let mut winner = 0;
        let mut best = 0;
        for (index, proposal) in self.proposals.iter().enumerate() {
            if proposal.vote_count >= best {
                best = proposal.vote_count;
                winner = index;
            }
        }
        winner
    }

    fn check_invariants(&self) -> VmResult<()> {
        let mut expected = vec![0u64; self.proposals.len()];
        let mut received: BTreeMap<Address, u64> = BTreeMap::new();

        for (key, voter) in &self.voters {
            ensure(*key == voter.address, || {
                format!("voter stored under {} claims address {}", key, voter.address)
            })?;
            ensure(!(voter.voted_directly() && voter.voted_by_delegation()), || {
                format!("{} both voted and delegated", key)
            })?;

            if let Some(target) = voter.delegate {
                ensure(target != *key, || format!("{} delegates to itself", key))?;
                ensure(self.voters.contains_key(&target), || {
                    format!("{} delegates to unknown voter {}", key, target)
                })?;
                *received.entry(target).or_default() += voter.weight;
            }

            match voter.vote {
                Some(index) => {
                    ensure(index < self.proposals.len(), || {
                        format!("{} voted for missing proposal {}", key, index)
                    })?;
                    expected[index] += voter.weight + voter.forwarded;
                }
                None => ensure(voter.forwarded == 0, || {
                    format!("{} has forwarded weight without a vote", key)
                })?,
            }
        }

        // every delegator's weight must have landed at its delegate
        for (address, voter) in &self.voters {
            let inbound = received.get(address).copied().unwrap_or(0);
            ensure(inbound >= voter.forwarded, || {
                format!(
                    "{} forwarded {} but only received {}",
                    address, voter.forwarded, inbound
                )
            })?;
            let absorbed = inbound - voter.forwarded;
            ensure(
                voter.weight >= absorbed && voter.weight - absorbed <= 1,
                || {
                    format!(
                        "{} has weight {} after absorbing {} delegated",
                        address, voter.weight, absorbed
                    )
                },
            )?;
        }

        self.check_acyclic()?;

        let total: u64 = self.proposals.iter().map(|p| p.vote_count).sum();
        let expected_total: u64 = expected.iter().sum();
        ensure(total == expected_total, || {
            format!(
                "total vote count {} differs from voted weight {}",
                total, expected_total
            )
        })?;
        for (index, proposal) in self.proposals.iter().enumerate() {
            ensure(proposal.vote_count == expected[index], || {
                format!(
                    "proposal {} ({}) counts {} but voters carry {}",
                    index, proposal.name, proposal.vote_count, expected[index]
                )
            })?;
        }
        Ok(())
    }

    fn check_acyclic(&self) -> VmResult<()> {
        for start in self.voters.keys() {
            let mut current = *start;
            let mut steps = 0usize;
            while let Some(next) = self.voters.get(&current).and_then(|v| v.delegate) {
                steps += 1;
                ensure(steps <= self.voters.len(), || {
                    format!("delegation chain from {} never terminates", start)
                })?;
                current = next;
            }
        }
        Ok(())
    }
}

/// Ballot contract instance
#[derive(Debug)]
pub struct Ballot {
    address: Address,
    chair_person: Address,
    storage: Mutex<BallotStorage>,
}

impl Ballot {
    /// Create a ballot; the context's sender becomes chair person
    ///
    /// Proposal names must be non-empty and unique. The chair is enrolled
    /// with weight 1.
    pub fn new(ctx: &CallContext, address: Address, proposal_names: Vec<String>) -> VmResult<Self> {
        if proposal_names.is_empty() {
            return Err(VmError::Precondition(
                "a ballot needs at least one proposal".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for name in &proposal_names {
            if !seen.insert(name.as_str()) {
                return Err(VmError::Precondition(format!(
                    "duplicate proposal name {:?}",
                    name
                )));
            }
        }

        let chair_person = ctx.sender();
        let proposals = proposal_names
            .into_iter()
            .map(|name| Proposal {
                name,
                vote_count: 0,
            })
            .collect::<Vec<_>>();
        let mut chair = Voter::new(chair_person);
        chair.weight = 1;

        info!(
            "Ballot {} created by {} with {} proposals",
            address,
            chair_person,
            proposals.len()
        );

        Ok(Self {
            address,
            chair_person,
            storage: Mutex::new(BallotStorage {
                proposals,
                voters: BTreeMap::from([(chair_person, chair)]),
            }),
        })
    }

    /// Chair person fixed at construction
    pub fn chair_person(&self) -> Address {
        self.chair_person
    }

    /// Grant `voter` a weight of at least 1. Chair only.
    ///
    /// Idempotent. A voter who already voted is left untouched.
    pub fn give_right_to_vote(&self, ctx: CallContext, voter: Address) -> VmResult<Returned<()>> {
        only_sender(self.chair_person).guard(ctx, |ctx| {
            let mut storage = self.storage.lock();
            storage.give_right_to_vote(voter);
            storage.check_invariants()?;
            debug!("{} may vote on ballot {}", voter, self.address);
            Ok(Returned::new(ctx, ()))
        })
    }

    /// Delegate the sender's vote to `to`
    ///
    /// Fails if the sender already voted or delegated, or if the chain
    /// starting at `to` loops back to the sender or cycles.
    pub fn delegate(&self, ctx: CallContext, to: Address) -> VmResult<Returned<()>> {
        let sender = ctx.sender();
        let mut storage = self.storage.lock();
        let target = storage.delegate(sender, to)?;
        storage.check_invariants()?;
        debug!("{} delegated to {} (resolved {})", sender, to, target);
        Ok(Returned::new(ctx, ()))
    }

    /// Vote for a proposal with the sender's full weight
    ///
    /// Returns `false` without changing anything if the sender already
    /// voted or delegated. An out-of-range index is an error.
    pub fn vote(&self, ctx: CallContext, proposal: usize) -> VmResult<Returned<bool>> {
        let sender = ctx.sender();
        let mut storage = self.storage.lock();
        let accepted = storage.vote(sender, proposal)?;
        if accepted {
            storage.check_invariants()?;
            debug!("{} voted for proposal {}", sender, proposal);
        }
        Ok(Returned::new(ctx, accepted))
    }

    /// Index of the proposal with the most votes
    pub fn winning_proposal(&self) -> usize {
        self.storage.lock().winning_proposal()
    }

    /// Name of the winning proposal
    pub fn winner_name(&self) -> String {
        let storage = self.storage.lock();
        storage.proposals[storage.winning_proposal()].name.clone()
    }

    /// Snapshot of all proposals
    pub fn proposals(&self) -> Vec<Proposal> {
        self.storage.lock().proposals.clone()
    }

    /// Snapshot of one voter record
    pub fn voter(&self, address: &Address) -> Option<Voter> {
        self.storage.lock().voters.get(address).cloned()
    }

    /// Snapshot of every voter record
    pub fn voters(&self) -> Vec<Voter> {
        self.storage.lock().voters.values().cloned().collect()
    }

    /// Sum of all proposal counts
    pub fn total_votes(&self) -> u64 {
        self.storage
            .lock()
            .proposals
            .iter()
            .map(|p| p.vote_count)
            .sum()
    }

    /// Bound `give_right_to_vote` call
    pub fn give_right_to_vote_call(self: &Arc<Self>, sender: Address, voter: Address) -> FunctionCall {
        let ballot = Arc::clone(self);
        FunctionCall::new(
            format!("giveRightToVote({})", voter),
            sender,
            self.address,
            move |ctx| ballot.give_right_to_vote(ctx, voter),
        )
    }

    /// Bound `delegate` call
    pub fn delegate_call(self: &Arc<Self>, sender: Address, to: Address) -> FunctionCall {
        let ballot = Arc::clone(self);
        FunctionCall::new(
            format!("delegate({})", to),
            sender,
            self.address,
            move |ctx| ballot.delegate(ctx, to),
        )
    }

    /// Bound `vote` call
    pub fn vote_call(self: &Arc<Self>, sender: Address, proposal: usize) -> FunctionCall {
        let ballot = Arc::clone(self);
        FunctionCall::new(
            format!("vote({})", proposal),
            sender,
            self.address,
            move |ctx| ballot.vote(ctx, proposal),
        )
    }
}

impl Contract for Ballot {
    fn name(&self) -> &'static str {
        "ballot"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_invariants(&self, _ledger: &Ledger) -> VmResult<()> {
        self.storage.lock().check_invariants()
    }
}
