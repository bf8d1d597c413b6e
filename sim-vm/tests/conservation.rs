use proptest::prelude::*;
use sim_core::{Account, Address, Balance, CallContext, Ledger, Message, Returned};
use sim_vm::{FunctionCall, Script, ScriptConfig, VmError};

fn genesis(balances: &[u32]) -> Ledger {
    Ledger::genesis(
        balances
            .iter()
            .enumerate()
            .map(|(i, b)| Account::external(Address::new(i as u64 + 1)).with_balance(*b)),
    )
    .unwrap()
}

/// (sender, recipient, value, operation fails)
fn call_strategy() -> impl Strategy<Value = (u64, u64, u32, bool)> {
    // address 7 does not exist in the ledger
    (1u64..=7, 1u64..=7, 0u32..300, any::<bool>())
}

fn build_call((sender, recipient, value, fails): (u64, u64, u32, bool)) -> FunctionCall {
    FunctionCall::new(
        "generated",
        Address::new(sender),
        Address::new(recipient),
        move |ctx| {
            if fails {
                return Err(VmError::Precondition("generated failure".into()));
            }
            Ok(Returned::new(ctx, value))
        },
    )
    .with_value(value)
}

proptest! {
    /// No sequence of calls creates or destroys value.
    #[test]
    fn script_conserves_total_supply(
        balances in prop::collection::vec(0u32..500, 6),
        calls in prop::collection::vec(call_strategy(), 0..40),
    ) {
        let ledger = genesis(&balances);
        let initial = CallContext::new(Message::from_sender(Address::new(1), 0), ledger.clone());

        let report = Script::new(&initial, ScriptConfig::default())
            .execute(calls.into_iter().map(build_call));

        prop_assert_eq!(report.ledger.total_supply(), ledger.total_supply());
        prop_assert!(report.ledger.verify().is_ok());
        prop_assert_eq!(report.ledger.len(), ledger.len());
    }

    /// A failing call leaves exactly the previous ledger behind.
    #[test]
    fn failed_call_is_noop(
        balances in prop::collection::vec(0u32..500, 6),
        call in call_strategy(),
    ) {
        let ledger = genesis(&balances);
        let initial = CallContext::new(Message::from_sender(Address::new(1), 0), ledger.clone());

        let script = Script::new(&initial, ScriptConfig::default());
        let outcome = script.submit(build_call(call));
        if !outcome.is_completed() {
            prop_assert_eq!(script.ledger(), ledger);
        } else {
            let (sender, _, value, _) = call;
            let before = ledger.balance_of(&Address::new(sender)).cloned().unwrap_or_default();
            prop_assert!(before >= Balance::from(value));
        }
    }
}
