use proptest::prelude::*;
use sim_contracts::{Ballot, Contract};
use sim_core::{Account, Address, CallContext, Ledger, Message};
use sim_vm::{FunctionCall, Script, ScriptConfig};
use std::sync::Arc;
use std::thread;

const CHAIR: u64 = 1;
const BALLOT: u64 = 100;
const VOTERS: u64 = 8;

#[derive(Debug, Clone)]
enum Op {
    GiveRight { sender: u64, voter: u64 },
    Delegate { sender: u64, to: u64 },
    Vote { sender: u64, proposal: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        // mostly the chair, sometimes an intruder
        (prop_oneof![3 => Just(CHAIR), 1 => 2u64..=VOTERS], 1u64..=VOTERS)
            .prop_map(|(sender, voter)| Op::GiveRight { sender, voter }),
        (1u64..=VOTERS, 1u64..=VOTERS).prop_map(|(sender, to)| Op::Delegate { sender, to }),
        // index 3 is out of range
        (1u64..=VOTERS, 0usize..4).prop_map(|(sender, proposal)| Op::Vote { sender, proposal }),
    ]
}

fn setup() -> (CallContext, Arc<Ballot>) {
    let mut accounts: Vec<Account> = (1..=VOTERS)
        .map(|i| Account::external(Address::new(i)).with_balance(50u32))
        .collect();
    accounts.push(Account::contract(Address::new(BALLOT)));
    let ledger = Ledger::genesis(accounts).unwrap();
    let ctx = CallContext::new(Message::from_sender(Address::new(CHAIR), 0), ledger);
    let ballot = Ballot::new(
        &ctx,
        Address::new(BALLOT),
        vec!["a".into(), "b".into(), "c".into()],
    )
    .unwrap();
    (ctx, Arc::new(ballot))
}

fn to_call(ballot: &Arc<Ballot>, op: &Op) -> FunctionCall {
    match *op {
        Op::GiveRight { sender, voter } => {
            ballot.give_right_to_vote_call(Address::new(sender), Address::new(voter))
        }
        Op::Delegate { sender, to } => ballot.delegate_call(Address::new(sender), Address::new(to)),
        Op::Vote { sender, proposal } => ballot.vote_call(Address::new(sender), proposal),
    }
}

proptest! {
    #[test]
    fn ballot_invariants_hold(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (ctx, ballot) = setup();
        let report = Script::new(&ctx, ScriptConfig::default())
            .execute(ops.iter().map(|op| to_call(&ballot, op)));

        prop_assert!(!report.aborted);
        prop_assert_eq!(report.fatal().count(), 0);
        prop_assert!(ballot.check_invariants(&report.ledger).is_ok());
        prop_assert_eq!(&report.ledger, &ctx.ledger);
    }

    /// Weight is only ever handed out one unit per voter and moved, never created.
    #[test]
    fn votes_never_exceed_granted_rights(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (ctx, ballot) = setup();
        Script::new(&ctx, ScriptConfig::default())
            .execute(ops.iter().map(|op| to_call(&ballot, op)));

        let voters = ballot.voters();
        let granted = voters.len() as u64;
        let direct: u64 = voters
            .iter()
            .filter(|v| v.voted_directly())
            .map(|v| v.weight + v.forwarded)
            .sum();

        prop_assert_eq!(ballot.total_votes(), direct);
        prop_assert!(ballot.total_votes() <= granted);
    }
}

#[test]
fn concurrent_voting_through_one_script() {
    let (ctx, ballot) = setup();
    let script = Arc::new(Script::new(&ctx, ScriptConfig::default()));

    for voter in 2..=VOTERS {
        script.submit(ballot.give_right_to_vote_call(Address::new(CHAIR), Address::new(voter)));
    }

    let handles: Vec<_> = (1..=VOTERS)
        .map(|id| {
            let ballot = Arc::clone(&ballot);
            let script = Arc::clone(&script);
            thread::spawn(move || {
                let sender = Address::new(id);
                if id % 3 == 0 {
                    script.submit(ballot.delegate_call(sender, Address::new(id - 1)));
                }
                script.submit(ballot.vote_call(sender, (id % 3) as usize));
                // value transfers interleave with ballot calls
                script.submit(FunctionCall::transfer(
                    sender,
                    Address::new(id % VOTERS + 1),
                    5u32,
                ));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ledger = script.ledger();
    assert!(!script.is_halted());
    assert!(ballot.check_invariants(&ledger).is_ok());
    assert_eq!(ballot.total_votes(), VOTERS);
    assert_eq!(ledger.total_supply(), ctx.ledger.total_supply());
}
