//! # Block Set Model
//!
//! Owned, already-deserialized block types consumed by the validators.
//!
//! The engine never fetches or parses wire bytes; the node's block-fetch
//! loop materializes one [`BlockSet`] per directory-block height and hands
//! it over. Each struct carries exactly the fields the validators read —
//! nothing else from the wire format survives to this layer.

use serde::{Deserialize, Serialize};
use tessera_types::{ChainId, EcPublicKey, FctAddress, Hash, KeyMr, Timestamp, TxId};

/// Directory block header fields the engine validates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBlockHeader {
    /// Network this block belongs to; must match the state's network id.
    pub network_id: u32,
    /// KeyMR of the previous directory block (zero for genesis).
    pub prev_key_mr: KeyMr,
    /// Full hash of the previous directory block (zero for genesis).
    pub prev_full_hash: Hash,
    /// Directory block height.
    pub height: u32,
    /// Block timestamp, forwarded to identity processing.
    pub timestamp: Timestamp,
}

/// One directory block entry: a chain and the KeyMR of its latest
/// entry block at this height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub chain_id: ChainId,
    pub key_mr: KeyMr,
}

/// A directory block: the per-height index of every other block.
///
/// The first three entries are, in fixed order, the admin, entry-credit,
/// and factoid chains; the rest are entry-block chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryBlock {
    pub header: DBlockHeader,
    /// Primary index: this block's KeyMR.
    pub key_mr: KeyMr,
    /// Secondary index: this block's full hash.
    pub full_hash: Hash,
    /// Raw serialized header, retained by the state for re-verification.
    pub header_bytes: Vec<u8>,
    pub entries: Vec<DirectoryEntry>,
}

/// Admin block: only the back-reference hash chain is tracked here; server
/// key rotation and fault semantics belong to the consensus layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBlock {
    /// Back-reference hash of the previous admin block.
    pub prev_back_ref_hash: Hash,
    /// This block's back-reference hash.
    pub back_ref_hash: Hash,
}

/// A factoid input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIo {
    pub address: FctAddress,
    /// Amount in factoshis (1e8 per unit).
    pub amount: u64,
}

/// An entry-credit purchase output: factoshis spent to credit an EC key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcOutput {
    pub ec_public_key: EcPublicKey,
    /// Amount in factoshis; converts to credits at the current exchange
    /// rate, truncating.
    pub amount: u64,
}

/// One factoid transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: TxId,
    pub inputs: Vec<TxIo>,
    pub outputs: Vec<TxIo>,
    pub ec_outputs: Vec<EcOutput>,
}

/// Factoid block: the value-bearing ledger for one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoidBlock {
    /// Primary index.
    pub key_mr: KeyMr,
    /// Secondary index (ledger KeyMR).
    pub ledger_key_mr: Hash,
    pub prev_key_mr: KeyMr,
    pub prev_ledger_key_mr: Hash,
    pub height: u32,
    /// Factoshis per entry credit, effective from this block onward.
    pub exchange_rate: u64,
    pub transactions: Vec<Transaction>,
}

/// Body of an entry or chain commit inside an entry-credit block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBody {
    /// Hash of the commit transaction itself.
    pub tx_id: TxId,
    /// Paying entry-credit key.
    pub ec_public_key: EcPublicKey,
    /// Hash of the entry being paid for.
    pub entry_hash: Hash,
    /// Cost in entry credits.
    pub credits: u64,
}

/// One entry of an entry-credit block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcBlockEntry {
    /// Minute divider; strictly increasing 1..=10 within a block.
    MinuteNumber(u8),
    /// Credit grant to an EC key (e.g. from a factoid purchase settling).
    BalanceIncrease {
        ec_public_key: EcPublicKey,
        tx_id: TxId,
        num_ec: u64,
    },
    /// Paid commitment for a future entry reveal.
    EntryCommit(CommitBody),
    /// Paid commitment for a future chain creation.
    ChainCommit(CommitBody),
}

/// Entry-credit block for one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcBlock {
    /// Primary index (header hash).
    pub header_hash: Hash,
    /// Secondary index (full hash).
    pub full_hash: Hash,
    pub prev_header_hash: Hash,
    pub prev_full_hash: Hash,
    pub height: u32,
    pub entries: Vec<EcBlockEntry>,
}

/// Entry block: the per-chain list of entry hashes revealed at one height,
/// interleaved with minute markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBlock {
    pub chain_id: ChainId,
    /// Primary index.
    pub key_mr: KeyMr,
    /// Secondary index.
    pub full_hash: Hash,
    pub prev_key_mr: KeyMr,
    pub prev_full_hash: Hash,
    /// Position of this block within its chain (0 for the first).
    pub sequence: u32,
    /// Entry hashes and minute markers, in block order.
    pub entry_hashes: Vec<Hash>,
}

impl EntryBlock {
    /// Entry hashes with minute markers filtered out.
    pub fn real_entry_hashes(&self) -> impl Iterator<Item = &Hash> {
        self.entry_hashes.iter().filter(|h| !h.is_minute_marker())
    }
}

/// A revealed entry. Only identity-chain entries are inspected beyond
/// their hash; everything else is consumed as an opaque reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub hash: Hash,
    pub chain_id: ChainId,
    /// External IDs; identity documents carry their version and type tag
    /// in the first two.
    pub ext_ids: Vec<Vec<u8>>,
    pub content: Vec<u8>,
}

/// One fully materialized height: a directory block plus everything it
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSet {
    pub directory: DirectoryBlock,
    pub admin: AdminBlock,
    pub factoid: FactoidBlock,
    pub entry_credit: EcBlock,
    pub entry_blocks: Vec<EntryBlock>,
    /// Flat list of revealed entries referenced by the entry blocks.
    pub entries: Vec<Entry>,
}
