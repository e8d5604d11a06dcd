//! # Replay Flows
//!
//! Happy-path choreography: multi-block replays through the full pipeline,
//! checking head linkage, balance conservation, the factoid-to-credit
//! purchase cycle, FIFO commit consumption, and snapshot round-trips.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{h, ChainHarness, TEST_EXCHANGE_RATE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tessera_replay::{BalanceLedger, ChainState};

    #[test]
    fn test_linked_chain_advances_all_heads() {
        let mut chain = ChainHarness::new();
        chain.advance(5).unwrap();

        assert_eq!(chain.height(), 4);
        assert_eq!(*chain.state.dblock_head_key_mr(), h("dblock-4"));
        assert_eq!(*chain.state.fblock_head_key_mr(), h("fblock-4"));
        assert_eq!(*chain.state.ecblock_head_key_mr(), h("ecblock-4"));
        assert_eq!(*chain.state.ablock_head_ref_hash(), h("ablock-4"));
    }

    #[test]
    fn test_transfers_conserve_total_supply() {
        let mut chain = ChainHarness::new();
        let (alice, bob, carol) = (h("alice"), h("bob"), h("carol"));

        let set = chain.block().grant(alice, 10_000).build();
        chain.apply(&set).unwrap();

        let set = chain
            .block()
            .transfer(alice, bob, 4_000)
            .transfer(alice, carol, 1_000)
            .build();
        chain.apply(&set).unwrap();

        let set = chain.block().transfer(bob, carol, 500).build();
        chain.apply(&set).unwrap();

        assert_eq!(chain.state.fct_balance(&alice), 5_000);
        assert_eq!(chain.state.fct_balance(&bob), 3_500);
        assert_eq!(chain.state.fct_balance(&carol), 1_500);
        let total = chain.state.fct_balance(&alice)
            + chain.state.fct_balance(&bob)
            + chain.state.fct_balance(&carol);
        assert_eq!(total, 10_000);
    }

    #[test]
    fn test_purchase_commit_reveal_cycle() {
        let mut chain = ChainHarness::new();
        let ec_key = h("ec key");
        let entry = h("an entry");
        let chain_id = h("a user chain");

        // Buy 5 credits (5_500 factoshis at 1_000 each, remainder dropped).
        let (builder, purchase_tx) = chain.block().buy_credits(ec_key, 5_500);
        let set = builder.build();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state.ec_balance(&ec_key), 5);
        assert_eq!(chain.state.ec_purchase(&purchase_tx, 0), Some(5));
        assert_eq!(chain.state.exchange_rate(), TEST_EXCHANGE_RATE);

        // Commit then reveal in the next block.
        let set = chain.block().commit(ec_key, entry, 2).build();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state.ec_balance(&ec_key), 3);
        assert!(chain.state.has_free_commit(&entry));

        let set = chain.block().reveal(chain_id, entry).build();
        chain.apply(&set).unwrap();
        assert!(!chain.state.has_free_commit(&entry));
        assert_eq!(chain.state.metrics().total_entries, 1);
        assert_eq!(chain.state.eblock_head(&chain_id).unwrap().sequence, 0);
    }

    #[test]
    fn test_fifo_pairing_over_three_commits() {
        let mut chain = ChainHarness::new();
        let ec_key = h("ec key");
        let entry = h("repeated entry");
        let chain_id = h("chain");

        let set = chain.block().balance_increase(ec_key, 10).build();
        chain.apply(&set).unwrap();

        // Three commits for the same hash at heights 1, 2, 3.
        for _ in 0..3 {
            let set = chain.block().commit(ec_key, entry, 1).build();
            chain.apply(&set).unwrap();
        }
        assert_eq!(chain.state.commits().outstanding(&entry), 3);

        // First reveal (height 4) consumes the height-1 commit: gap 3.
        let set = chain.block().reveal(chain_id, entry).build();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state.commits().outstanding(&entry), 2);
        assert_eq!(chain.state.metrics().latest_reveal_gap, 3);

        let set = chain.block().reveal(chain_id, entry).build();
        chain.apply(&set).unwrap();
        let set = chain.block().reveal(chain_id, entry).build();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state.commits().outstanding(&entry), 0);
        assert_eq!(chain.state.metrics().total_entries, 3);
        // Later reveals consumed younger commits; the gap maximum stands.
        assert_eq!(chain.state.metrics().latest_reveal_gap, 3);
    }

    #[test]
    fn test_snapshot_restore_mid_replay() {
        let mut chain = ChainHarness::new();
        let set = chain.block().grant(h("alice"), 777).build();
        chain.apply(&set).unwrap();
        chain.advance(3).unwrap();

        let bytes = chain.state.snapshot().unwrap();
        let restored: ChainState = ChainState::restore(&bytes).unwrap();
        assert_eq!(chain.state, restored);

        // The restored replica replays the next block identically.
        let set = chain.block().grant(h("bob"), 1).build();
        let mut replica = restored;
        replica.process_block_set(&set).unwrap();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state, replica);
    }

    #[test]
    fn test_audit_ledger_agrees_with_pipeline_balances() {
        // The standalone audit ledger replays the same factoid blocks
        // through its own net-delta path; both views must agree.
        let mut chain = ChainHarness::new();
        let mut ledger = BalanceLedger::new();
        let (alice, bob) = (h("alice"), h("bob"));

        let set = chain.block().grant(alice, 50_000).build();
        ledger.process_fblock(&set.factoid).unwrap();
        chain.apply(&set).unwrap();

        let set = chain
            .block()
            .transfer(alice, bob, 12_000)
            .transfer(bob, alice, 2_000)
            .build();
        ledger.process_fblock(&set.factoid).unwrap();
        chain.apply(&set).unwrap();

        for address in [alice, bob] {
            assert_eq!(
                ledger.balance_of(&address),
                chain.state.fct_balance(&address)
            );
        }
        assert_eq!(ledger.deltas().len(), 2);
        assert_eq!(ledger.deltas()[1].changes[&alice], -10_000);
    }

    #[test]
    fn test_randomized_transfers_replay_identically_in_both_views() {
        let mut rng = StdRng::seed_from_u64(0x7e55);
        let addresses: Vec<_> = (0..4).map(|i| h(&format!("addr-{i}"))).collect();

        let mut chain = ChainHarness::new();
        let mut ledger = BalanceLedger::new();
        let mut builder = chain.block();
        for address in &addresses {
            builder = builder.grant(*address, 1_000_000);
        }
        let set = builder.build();
        ledger.process_fblock(&set.factoid).unwrap();
        chain.apply(&set).unwrap();

        // Amounts are small enough relative to the grants that every
        // generated transfer is payable.
        for _ in 0..20 {
            let mut builder = chain.block();
            for _ in 0..rng.gen_range(1..5) {
                let from = addresses[rng.gen_range(0..addresses.len())];
                let to = addresses[rng.gen_range(0..addresses.len())];
                builder = builder.transfer(from, to, rng.gen_range(1..1_000));
            }
            let set = builder.build();
            ledger.process_fblock(&set.factoid).unwrap();
            chain.apply(&set).unwrap();
        }

        let mut total = 0;
        for address in &addresses {
            assert_eq!(
                ledger.balance_of(address),
                chain.state.fct_balance(address)
            );
            total += chain.state.fct_balance(address);
        }
        assert_eq!(total, 4_000_000);
        assert_eq!(ledger.deltas().len(), 21);
    }

    #[test]
    fn test_entry_chain_sequence_grows_across_blocks() {
        let mut chain = ChainHarness::new();
        let ec_key = h("ec key");
        let chain_id = h("growing chain");

        let set = chain.block().balance_increase(ec_key, 10).build();
        chain.apply(&set).unwrap();

        for i in 0..4u32 {
            let entry = h(&format!("entry-{i}"));
            let set = chain
                .block()
                .commit(ec_key, entry, 1)
                .reveal(chain_id, entry)
                .build();
            chain.apply(&set).unwrap();
            assert_eq!(chain.state.eblock_head(&chain_id).unwrap().sequence, i);
        }
        assert_eq!(chain.state.metrics().total_entries, 4);
    }
}
