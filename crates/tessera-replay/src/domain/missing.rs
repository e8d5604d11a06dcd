//! # Missing Entry Tracker
//!
//! Diagnostic registry correlating commits that arrived before their entry
//! was retrievable. When a reveal shows up with no live commit the entry is
//! recorded here; if a commit for a recorded entry arrives later, the two
//! are correlated instead of queueing a commit that already had its reveal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tessera_types::{Hash, KeyMr, TxId};

/// One entry observed without a matching commit, and the commit that later
/// claimed it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub entry_hash: Hash,
    /// Directory block in which the unmatched reveal was seen.
    pub dblock_key_mr: KeyMr,
    pub height: u32,
    /// Commit transaction that arrived after the fact.
    pub commit_tx_id: Option<TxId>,
    pub found_height: Option<u32>,
}

impl MissingEntry {
    pub fn is_resolved(&self) -> bool {
        self.commit_tx_id.is_some()
    }
}

/// Registry of unmatched reveals, keyed by entry hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntryTracker {
    entries: HashMap<Hash, MissingEntry>,
}

impl MissingEntryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reveal that had no live commit.
    pub fn record_missing(&mut self, entry_hash: Hash, dblock_key_mr: KeyMr, height: u32) {
        tracing::warn!(
            "[tessera-replay] non-committed entry {} at height {} (dblock {})",
            entry_hash,
            height,
            dblock_key_mr
        );
        self.entries.entry(entry_hash).or_insert(MissingEntry {
            entry_hash,
            dblock_key_mr,
            height,
            commit_tx_id: None,
            found_height: None,
        });
    }

    /// Correlate a late commit with a previously recorded entry. Returns
    /// false if the entry was never recorded missing.
    pub fn record_found(&mut self, entry_hash: &Hash, commit_tx_id: TxId, height: u32) -> bool {
        match self.entries.get_mut(entry_hash) {
            Some(e) => {
                e.commit_tx_id = Some(commit_tx_id);
                e.found_height = Some(height);
                tracing::warn!(
                    "[tessera-replay] late commit {} for missing entry {} at height {}",
                    commit_tx_id,
                    entry_hash,
                    height
                );
                true
            }
            None => false,
        }
    }

    /// Whether this entry is currently flagged missing (late commit not yet
    /// seen).
    pub fn is_missing(&self, entry_hash: &Hash) -> bool {
        self.entries
            .get(entry_hash)
            .is_some_and(|e| !e.is_resolved())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unresolved(&self) -> usize {
        self.entries.values().filter(|e| !e.is_resolved()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissingEntry> {
        self.entries.values()
    }
}
