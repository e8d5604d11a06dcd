//! # Commit Expiration
//!
//! End-to-end checks of the expiration window: a commit satisfies reveals
//! up to and including `commit_height + window`, and is gone one block
//! later. Off main-net the window is always 20 blocks.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{h, ChainHarness};
    use tessera_replay::{ReplayError, COMMIT_EXPIRATION_M2};

    fn committed_chain(entry: tessera_types::Hash) -> ChainHarness {
        let mut chain = ChainHarness::new();
        let ec_key = h("ec key");
        let set = chain
            .block()
            .balance_increase(ec_key, 10)
            .commit(ec_key, entry, 1)
            .build();
        chain.apply(&set).unwrap();
        chain
    }

    #[test]
    fn test_reveal_at_window_edge_succeeds() {
        let entry = h("patient entry");
        let mut chain = committed_chain(entry);

        // Commit is at height 0; reveal lands exactly at height 0 + window.
        chain.advance(COMMIT_EXPIRATION_M2 - 1).unwrap();
        let set = chain.block().reveal(h("chain"), entry).build();
        chain.apply(&set).unwrap();

        assert_eq!(chain.height(), COMMIT_EXPIRATION_M2);
        assert_eq!(chain.state.metrics().total_entries, 1);
        assert_eq!(
            chain.state.metrics().latest_reveal_gap,
            COMMIT_EXPIRATION_M2
        );
    }

    #[test]
    fn test_reveal_one_past_window_fails() {
        let entry = h("too patient entry");
        let mut chain = committed_chain(entry);

        chain.advance(COMMIT_EXPIRATION_M2).unwrap();
        let set = chain.block().reveal(h("chain"), entry).build();
        let err = chain.apply(&set).unwrap_err();
        assert!(matches!(err, ReplayError::UncommittedEntry { .. }));

        // The rejected set was discarded wholesale, so the live state still
        // carries the (now dead) commit until the next accepted block's
        // sweep reaps it.
        assert_eq!(chain.state.commits().outstanding(&entry), 1);
        chain.advance(1).unwrap();
        assert_eq!(chain.state.commits().outstanding(&entry), 0);
        assert_eq!(chain.state.metrics().expired_commits, 1);
    }

    #[test]
    fn test_sweep_counts_expired_commits() {
        let mut chain = ChainHarness::new();
        let ec_key = h("ec key");
        let set = chain
            .block()
            .balance_increase(ec_key, 10)
            .commit(ec_key, h("e1"), 1)
            .commit(ec_key, h("e2"), 1)
            .commit(ec_key, h("e3"), 1)
            .build();
        chain.apply(&set).unwrap();
        assert_eq!(chain.state.commits().len(), 3);

        chain.advance(COMMIT_EXPIRATION_M2 + 1).unwrap();
        assert_eq!(chain.state.commits().len(), 0);
        assert_eq!(chain.state.metrics().expired_commits, 3);
    }
}
