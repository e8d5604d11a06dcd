//! # Replay Errors
//!
//! Typed error taxonomy for the validation pipeline. Every variant is fatal
//! to the block set that produced it: the engine performs no retries, and
//! the staged state is discarded, so a rejected set leaves the live state
//! untouched. Identity decode/apply failures are deliberately *not* here —
//! they are non-fatal and only logged.

use tessera_types::Hash;
use thiserror::Error;

/// Which block of the set a linkage/structural error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Directory,
    Admin,
    Factoid,
    EntryCredit,
    Entry,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockKind::Directory => "directory",
            BlockKind::Admin => "admin",
            BlockKind::Factoid => "factoid",
            BlockKind::EntryCredit => "entry-credit",
            BlockKind::Entry => "entry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    // ---- Linkage errors ----
    #[error("{block} block previous KeyMR mismatch: expected {expected}, got {got}")]
    PrevKeyMrMismatch {
        block: BlockKind,
        expected: Hash,
        got: Hash,
    },

    #[error("{block} block previous hash mismatch: expected {expected}, got {got}")]
    PrevHashMismatch {
        block: BlockKind,
        expected: Hash,
        got: Hash,
    },

    #[error("{block} block wrong height: expected {expected}, got {got}")]
    WrongHeight {
        block: BlockKind,
        expected: u32,
        got: u32,
    },

    #[error("wrong network id: expected {expected:#010x}, got {got:#010x}")]
    NetworkMismatch { expected: u32, got: u32 },

    #[error("checkpoint mismatch at height {height}: expected {expected}, got {got}")]
    CheckpointMismatch {
        height: u32,
        expected: Hash,
        got: Hash,
    },

    // ---- Structural errors ----
    #[error("directory block has {got} entries, need at least 3")]
    TooFewDirectoryEntries { got: usize },

    #[error("directory entry {position} must be chain {expected}, got {got}")]
    MisplacedSystemChain {
        position: usize,
        expected: Hash,
        got: Hash,
    },

    #[error("duplicate chain id {chain_id} in block set")]
    DuplicateChainId { chain_id: Hash },

    #[error("{block} block minute number {minute} out of range at position {position}")]
    InvalidMinuteNumber {
        block: BlockKind,
        position: usize,
        minute: u8,
    },

    #[error("{block} block minute {minute} at position {position} not greater than previous minute {last}")]
    OutOfOrderMinute {
        block: BlockKind,
        position: usize,
        minute: u8,
        last: u8,
    },

    #[error("entry block for chain {chain_id} has sequence {got}, expected {expected}")]
    WrongEBlockSequence {
        chain_id: Hash,
        expected: u32,
        got: u32,
    },

    #[error("transaction {tx_id} has an entry-credit output but the exchange rate is zero")]
    ZeroExchangeRate { tx_id: Hash },

    // ---- Balance errors ----
    #[error("not enough factoids: address {address} has {balance}, needs {needed}")]
    InsufficientFactoids {
        address: Hash,
        balance: i64,
        needed: u64,
    },

    #[error("not enough entry credits: key {key} has {balance}, needs {needed}")]
    InsufficientCredits { key: Hash, balance: u64, needed: u64 },

    #[error("balance overflow for {address}")]
    BalanceOverflow { address: Hash },

    // ---- Causality errors ----
    #[error("non-committed entry {entry_hash} in entry block {eblock} at height {height}")]
    UncommittedEntry {
        entry_hash: Hash,
        eblock: Hash,
        height: u32,
    },

    // ---- Hook errors ----
    #[error("block hook rejected {key_mr} at height {height}: {reason}")]
    HookRejected {
        key_mr: Hash,
        height: u32,
        reason: String,
    },
}

/// Errors from state snapshot / restore.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("binary snapshot failed: {0}")]
    Binary(#[from] bincode::Error),
    #[error("json dump failed: {0}")]
    Json(#[from] serde_json::Error),
}
