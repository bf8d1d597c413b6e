//! Fixed demonstration scenarios

use crate::config::SimConfig;
use anyhow::Context;
use serde::Serialize;
use sim_contracts::{Ballot, Contract, Proposal, SimpleAuction};
use sim_core::{Address, CallContext, Message};
use sim_vm::Script;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct BallotSummary {
    pub proposals: Vec<Proposal>,
    pub winner: String,
    pub completed: usize,
    pub reverted: usize,
    pub ledger_unchanged: bool,
    pub invariants_hold: bool,
}

impl BallotSummary {
    pub fn passed(&self) -> bool {
        self.ledger_unchanged && self.invariants_hold
    }
}

#[derive(Debug, Serialize)]
pub struct AuctionSummary {
    pub highest_bidder: Option<Address>,
    pub highest_bid: String,
    /// Final balance per account, keyed by `#n`
    pub balances: BTreeMap<String, String>,
    pub completed: usize,
    pub reverted: usize,
    pub supply_conserved: bool,
    pub invariants_hold: bool,
}

impl AuctionSummary {
    pub fn passed(&self) -> bool {
        self.supply_conserved && self.invariants_hold
    }
}

/// Chair gives rights to #3, #4 and #6, #4 delegates to #5, then #3, #5
/// and #6 vote for the last proposal.
pub fn run_ballot(config: &SimConfig) -> anyhow::Result<BallotSummary> {
    anyhow::ensure!(config.accounts >= 6, "the ballot scenario needs 6 accounts");
    let ledger = config.genesis(1)?;
    let initial = CallContext::new(Message::from_sender(config.chair(), 0), ledger);

    let ballot = Arc::new(
        Ballot::new(&initial, config.contract_address(0), config.proposals.clone())
            .context("Failed to create ballot")?,
    );
    let last = config.proposals.len() - 1;
    let chair = config.chair();
    let a = Address::new;

    let script = Script::new(&initial, config.script_config());
    let report = script.execute(vec![
        ballot.give_right_to_vote_call(chair, a(3)),
        ballot.give_right_to_vote_call(chair, a(4)),
        ballot.give_right_to_vote_call(chair, a(6)),
        ballot.delegate_call(a(4), a(5)),
        ballot.vote_call(a(3), last),
        ballot.vote_call(a(5), last),
        ballot.vote_call(a(6), last),
    ]);

    let summary = BallotSummary {
        proposals: ballot.proposals(),
        winner: ballot.winner_name(),
        completed: report.completed(),
        reverted: report.reverted(),
        ledger_unchanged: report.ledger == initial.ledger,
        invariants_hold: ballot.check_invariants(&report.ledger).is_ok(),
    };
    info!("Ballot scenario winner: {}", summary.winner);
    Ok(summary)
}

/// Three increasing bids, every outbid bidder withdraws twice, then the
/// auction ends.
pub fn run_auction(config: &SimConfig) -> anyhow::Result<AuctionSummary> {
    anyhow::ensure!(config.accounts >= 4, "the auction scenario needs 4 accounts");
    let ledger = config.genesis(1)?;
    let supply = ledger.total_supply();
    let beneficiary = config.chair();
    let bidders: Vec<Address> = config
        .addresses()
        .filter(|address| *address != beneficiary)
        .take(3)
        .collect();

    let initial = CallContext::new(Message::from_sender(beneficiary, 0), ledger);
    let auction = Arc::new(SimpleAuction::new(
        &initial,
        config.contract_address(0),
        beneficiary,
        10,
    ));

    let mut calls = Vec::new();
    for (round, bidder) in bidders.iter().enumerate() {
        let amount = 10 * (round as u32 + 1);
        calls.push(auction.bid_call(*bidder, amount).at(round as u64 + 1));
    }
    for bidder in &bidders {
        calls.push(auction.withdraw_call(*bidder).at(5));
        calls.push(auction.withdraw_call(*bidder).at(6));
    }
    calls.push(auction.auction_end_call(beneficiary).at(auction.bidding_end()));

    let report = Script::new(&initial, config.script_config()).execute(calls);
    let summary = AuctionSummary {
        highest_bidder: auction.highest_bidder(),
        highest_bid: auction.highest_bid().to_string(),
        balances: report
            .ledger
            .accounts()
            .map(|account| (account.address.to_string(), account.balance.to_string()))
            .collect(),
        completed: report.completed(),
        reverted: report.reverted(),
        supply_conserved: report.ledger.total_supply() == supply,
        invariants_hold: auction.check_invariants(&report.ledger).is_ok(),
    };
    info!(
        "Auction scenario: {:?} won with {}",
        summary.highest_bidder, summary.highest_bid
    );
    Ok(summary)
}
