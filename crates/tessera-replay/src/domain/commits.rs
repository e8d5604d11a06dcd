//! # Pending Commit Pool
//!
//! Outstanding entry/chain commitments keyed by entry hash. Each hash owns
//! a FIFO queue: the oldest unexpired commit satisfies the oldest reveal.
//!
//! ## Expiration
//!
//! A commit made at height `H` is live while `H + WINDOW >= current`. The
//! window is a historical protocol parameter, not a tunable: 500 blocks on
//! main-net before the M2 switch height, 20 blocks from the switch onward,
//! and always 20 blocks on any other network.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tessera_types::{Hash, TxId, M2_SWITCH_HEIGHT};

/// Commit expiration window before the M2 switch (main-net only).
pub const COMMIT_EXPIRATION_M1: u32 = 500;
/// Commit expiration window from the M2 switch onward, and on every
/// non-main network.
pub const COMMIT_EXPIRATION_M2: u32 = 20;

/// The expiration window in force at `current_height`.
pub fn expiration_window(current_height: u32, main_net: bool) -> u32 {
    if main_net && current_height < M2_SWITCH_HEIGHT {
        COMMIT_EXPIRATION_M1
    } else {
        COMMIT_EXPIRATION_M2
    }
}

/// One outstanding commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleCommit {
    /// Directory-block height at which the commit was accepted.
    pub height: u32,
    /// Hash of the commit transaction, for traceability.
    pub tx_id: TxId,
}

impl SingleCommit {
    fn expired(&self, current_height: u32, main_net: bool) -> bool {
        self.height + expiration_window(current_height, main_net) < current_height
    }
}

/// FIFO queue of commits for one entry hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommit {
    commits: VecDeque<SingleCommit>,
}

impl PendingCommit {
    pub fn push(&mut self, commit: SingleCommit) {
        self.commits.push_back(commit);
    }

    /// Drop expired commits from the front, then pop the oldest live one.
    /// Returns the popped commit and the number of commits expired on the
    /// way.
    pub fn pop_live(&mut self, current_height: u32, main_net: bool) -> (Option<SingleCommit>, u64) {
        let expired = self.drop_expired(current_height, main_net);
        (self.commits.pop_front(), expired)
    }

    pub fn has_live_commit(&self, current_height: u32, main_net: bool) -> bool {
        self.commits
            .iter()
            .any(|c| !c.expired(current_height, main_net))
    }

    /// Pop every expired commit off the front of the queue. Commits behind
    /// a live one are by construction younger, so the front is the only
    /// place expiry can occur.
    pub fn drop_expired(&mut self, current_height: u32, main_net: bool) -> u64 {
        let mut dropped = 0;
        while let Some(front) = self.commits.front() {
            if front.expired(current_height, main_net) {
                self.commits.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }
}

/// All outstanding commits, keyed by entry hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPool {
    pending: HashMap<Hash, PendingCommit>,
}

impl CommitPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry_hash: Hash, tx_id: TxId, height: u32) {
        self.pending
            .entry(entry_hash)
            .or_default()
            .push(SingleCommit { height, tx_id });
    }

    /// Consume the oldest live commit for `entry_hash`. Empty queues are
    /// garbage-collected on the way out. Returns the consumed commit (if
    /// any) and the count of expired commits discarded first.
    pub fn pop_live(
        &mut self,
        entry_hash: &Hash,
        current_height: u32,
        main_net: bool,
    ) -> (Option<SingleCommit>, u64) {
        let Some(queue) = self.pending.get_mut(entry_hash) else {
            return (None, 0);
        };
        let (commit, expired) = queue.pop_live(current_height, main_net);
        if queue.is_empty() {
            self.pending.remove(entry_hash);
        }
        (commit, expired)
    }

    pub fn has_live_commit(&self, entry_hash: &Hash, current_height: u32, main_net: bool) -> bool {
        self.pending
            .get(entry_hash)
            .is_some_and(|q| q.has_live_commit(current_height, main_net))
    }

    /// Per-block sweep: expire the head of every queue, dropping queues
    /// that empty out. Returns the number of commits expired.
    pub fn clear_expired(&mut self, current_height: u32, main_net: bool) -> u64 {
        let mut expired = 0;
        self.pending.retain(|_, queue| {
            expired += queue.drop_expired(current_height, main_net);
            !queue.is_empty()
        });
        expired
    }

    /// Number of entry hashes with at least one queued commit.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queued commits (live or not) for one entry hash.
    pub fn outstanding(&self, entry_hash: &Hash) -> usize {
        self.pending.get(entry_hash).map_or(0, PendingCommit::len)
    }
}
