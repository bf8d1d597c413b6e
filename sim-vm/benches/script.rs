use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use sim_core::{Address, Balance, CallContext, Ledger, Message};
use sim_vm::{FunctionCall, Script, ScriptConfig};

fn transfers(count: u64, accounts: u64) -> Vec<FunctionCall> {
    (0..count)
        .map(|i| {
            let from = Address::new(1 + i % accounts);
            let to = Address::new(1 + (i + 1) % accounts);
            FunctionCall::transfer(from, to, 1u32)
        })
        .collect()
}

fn bench_script(c: &mut Criterion) {
    let ledger = Ledger::with_external_accounts(
        (1..=100).map(Address::new),
        &Balance::from(1_000_000u32),
    )
    .unwrap();
    let initial = CallContext::new(Message::from_sender(Address::new(1), 0), ledger);

    c.bench_function("script_1000_transfers", |b| {
        b.iter_batched(
            || transfers(1000, 100),
            |calls| {
                Script::new(&initial, ScriptConfig::default()).execute(calls)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_script);
criterion_main!(benches);
