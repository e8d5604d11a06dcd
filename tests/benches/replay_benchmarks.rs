//! Replay engine benchmarks: linked-chain throughput and snapshot cost.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tessera_replay::ChainState;
use tessera_tests::integration::harness::{h, ChainHarness};

/// Pre-build a 50-block chain with factoid traffic and a commit/reveal
/// pair per block.
fn build_chain() -> (ChainHarness, Vec<tessera_replay::BlockSet>) {
    let mut recorder = ChainHarness::new();
    let mut sets = Vec::new();
    let (alice, bob, ec_key) = (h("alice"), h("bob"), h("ec key"));

    let set = recorder
        .block()
        .grant(alice, 1_000_000_000)
        .balance_increase(ec_key, 1_000_000)
        .build();
    recorder.apply(&set).unwrap();
    sets.push(set);

    for i in 0..49u32 {
        let entry = h(&format!("bench-entry-{i}"));
        let set = recorder
            .block()
            .transfer(alice, bob, 10)
            .commit(ec_key, entry, 1)
            .reveal(h("bench chain"), entry)
            .build();
        recorder.apply(&set).unwrap();
        sets.push(set);
    }
    (recorder, sets)
}

fn bench_linked_replay(c: &mut Criterion) {
    let (_, sets) = build_chain();
    c.bench_function("replay_50_block_sets", |b| {
        b.iter_batched(
            ChainState::local_net,
            |mut state| {
                for set in &sets {
                    state.process_block_set(set).unwrap();
                }
                state
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    let (chain, _) = build_chain();
    c.bench_function("snapshot_and_restore", |b| {
        b.iter(|| {
            let bytes = chain.state.snapshot().unwrap();
            ChainState::restore(&bytes).unwrap()
        })
    });
}

criterion_group!(benches, bench_linked_replay, bench_snapshot_round_trip);
criterion_main!(benches);
