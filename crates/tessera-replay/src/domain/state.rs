//! # Chain State
//!
//! The aggregate root of the replay engine: network identity, per-chain
//! heads, balances, outstanding commits, diagnostics, and the identity
//! collaborator. One instance per chain replica; mutation happens only
//! through the block pipeline in [`crate::domain::pipeline`].

use crate::adapters::IdentityRegistry;
use crate::domain::commits::CommitPool;
use crate::domain::errors::SnapshotError;
use crate::domain::metrics::ReplayMetrics;
use crate::domain::missing::MissingEntryTracker;
use crate::ports::IdentityOps;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tessera_types::{
    ChainId, EcPublicKey, FctAddress, Hash, KeyMr, Timestamp, LOCAL_NETWORK_ID, MAIN_NETWORK_ID,
    TEST_NETWORK_ID,
};

/// Latest entry block of one chain: identity pair plus chain-local
/// sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EBlockHead {
    pub key_mr: KeyMr,
    pub full_hash: Hash,
    pub sequence: u32,
}

/// Canonical chain state, replayed from block sets in height order.
///
/// Cloning produces an independent replica (speculative validation, fork
/// evaluation); nothing is shared between clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainState<I: IdentityOps = IdentityRegistry> {
    pub(crate) network_id: u32,

    // Directory chain head.
    pub(crate) dblock_head_key_mr: KeyMr,
    pub(crate) dblock_head_hash: Hash,
    pub(crate) dblock_height: u32,
    pub(crate) dblock_timestamp: Timestamp,
    pub(crate) dblock_header_bytes: Vec<u8>,

    // Other system chain heads.
    pub(crate) ecblock_head_key_mr: Hash,
    pub(crate) ecblock_head_hash: Hash,
    pub(crate) fblock_head_key_mr: KeyMr,
    pub(crate) fblock_head_hash: Hash,
    pub(crate) ablock_head_ref_hash: Hash,

    /// Latest entry-block KeyMR per chain ever referenced by a directory
    /// block. Grows monotonically; authoritative during a replay session.
    pub(crate) block_heads: HashMap<ChainId, KeyMr>,
    /// Per-chain entry-block linkage state.
    pub(crate) eblock_heads: HashMap<ChainId, EBlockHead>,

    pub(crate) ec_balances: HashMap<EcPublicKey, u64>,
    pub(crate) f_balances: HashMap<FctAddress, i64>,
    /// Factoshis per entry credit, from the most recent factoid block.
    pub(crate) exchange_rate: u64,
    /// EC purchase audit log, keyed `"<tx_id>:<output_index>"`.
    pub(crate) ec_purchases: BTreeMap<String, u64>,

    pub(crate) commits: CommitPool,
    pub(crate) missing_entries: MissingEntryTracker,
    pub(crate) metrics: ReplayMetrics,

    pub(crate) identity: I,
}

impl ChainState<IdentityRegistry> {
    /// Main-net state with the in-memory identity registry.
    pub fn main_net() -> Self {
        Self::with_identity(MAIN_NETWORK_ID, IdentityRegistry::new())
    }

    /// Test-net state with the in-memory identity registry.
    pub fn test_net() -> Self {
        Self::with_identity(TEST_NETWORK_ID, IdentityRegistry::new())
    }

    /// Local-net state with the in-memory identity registry.
    pub fn local_net() -> Self {
        Self::with_identity(LOCAL_NETWORK_ID, IdentityRegistry::new())
    }
}

impl<I: IdentityOps> ChainState<I> {
    /// Fresh state for `network_id` with a caller-supplied identity
    /// manager.
    pub fn with_identity(network_id: u32, identity: I) -> Self {
        Self {
            network_id,
            dblock_head_key_mr: Hash::ZERO,
            dblock_head_hash: Hash::ZERO,
            dblock_height: 0,
            dblock_timestamp: 0,
            dblock_header_bytes: Vec::new(),
            ecblock_head_key_mr: Hash::ZERO,
            ecblock_head_hash: Hash::ZERO,
            fblock_head_key_mr: Hash::ZERO,
            fblock_head_hash: Hash::ZERO,
            ablock_head_ref_hash: Hash::ZERO,
            block_heads: HashMap::new(),
            eblock_heads: HashMap::new(),
            ec_balances: HashMap::new(),
            f_balances: HashMap::new(),
            exchange_rate: 0,
            ec_purchases: BTreeMap::new(),
            commits: CommitPool::new(),
            missing_entries: MissingEntryTracker::new(),
            metrics: ReplayMetrics::default(),
            identity,
        }
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn is_main_net(&self) -> bool {
        self.network_id == MAIN_NETWORK_ID
    }

    pub fn dblock_height(&self) -> u32 {
        self.dblock_height
    }

    pub fn dblock_head_key_mr(&self) -> &KeyMr {
        &self.dblock_head_key_mr
    }

    pub fn dblock_head_hash(&self) -> &Hash {
        &self.dblock_head_hash
    }

    pub fn dblock_timestamp(&self) -> Timestamp {
        self.dblock_timestamp
    }

    pub fn ecblock_head_key_mr(&self) -> &Hash {
        &self.ecblock_head_key_mr
    }

    pub fn fblock_head_key_mr(&self) -> &KeyMr {
        &self.fblock_head_key_mr
    }

    pub fn ablock_head_ref_hash(&self) -> &Hash {
        &self.ablock_head_ref_hash
    }

    pub fn exchange_rate(&self) -> u64 {
        self.exchange_rate
    }

    pub fn ec_balance(&self, key: &EcPublicKey) -> u64 {
        self.ec_balances.get(key).copied().unwrap_or(0)
    }

    pub fn fct_balance(&self, address: &FctAddress) -> i64 {
        self.f_balances.get(address).copied().unwrap_or(0)
    }

    /// Latest entry-block KeyMR for a chain, as seen by directory blocks.
    pub fn block_head(&self, chain_id: &ChainId) -> Option<&KeyMr> {
        self.block_heads.get(chain_id)
    }

    pub fn eblock_head(&self, chain_id: &ChainId) -> Option<&EBlockHead> {
        self.eblock_heads.get(chain_id)
    }

    pub fn commits(&self) -> &CommitPool {
        &self.commits
    }

    pub fn missing_entries(&self) -> &MissingEntryTracker {
        &self.missing_entries
    }

    pub fn metrics(&self) -> &ReplayMetrics {
        &self.metrics
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// EC credits bought by a specific transaction output, if recorded.
    pub fn ec_purchase(&self, tx_id: &Hash, output_index: usize) -> Option<u64> {
        self.ec_purchases.get(&purchase_key(tx_id, output_index)).copied()
    }

    /// Binary snapshot of the full state (commit-queue order included).
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError>
    where
        I: Serialize,
    {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a state previously produced by [`ChainState::snapshot`].
    pub fn restore(bytes: &[u8]) -> Result<Self, SnapshotError>
    where
        I: DeserializeOwned,
    {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Human-readable dump for operator diagnostics.
    pub fn to_json(&self) -> Result<String, SnapshotError>
    where
        I: Serialize,
    {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn purchase_key(tx_id: &Hash, output_index: usize) -> String {
    format!("{tx_id}:{output_index}")
}
