//! Replay counters, owned by the state so that independent replicas keep
//! independent numbers.

use serde::{Deserialize, Serialize};

/// Counters accumulated across a replay session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayMetrics {
    /// Non-marker entry hashes consumed from entry blocks.
    pub total_entries: u64,
    /// Commits dropped by the expiration sweep or during a pop.
    pub expired_commits: u64,
    /// Largest observed commit-to-reveal height gap.
    pub latest_reveal_gap: u32,
}

impl ReplayMetrics {
    /// Record the height gap between a reveal and the commit it consumed.
    pub fn note_reveal_gap(&mut self, gap: u32) {
        if gap > self.latest_reveal_gap {
            self.latest_reveal_gap = gap;
        }
    }
}
