//! # Replay Harness
//!
//! Builds well-linked block sets on top of a live [`ChainState`], so
//! integration tests describe intent (grants, transfers, commits, reveals)
//! instead of hand-wiring hashes. The harness tracks every head the engine
//! checks and only advances its tracking when the engine accepts the set,
//! which keeps it usable for rejection tests.

use std::collections::BTreeMap;
use tessera_replay::domain::blocks::{
    AdminBlock, BlockSet, CommitBody, DBlockHeader, DirectoryBlock, DirectoryEntry, EcBlock,
    EcBlockEntry, EcOutput, Entry, EntryBlock, FactoidBlock, Transaction, TxIo,
};
use tessera_replay::{ChainState, ReplayError};
use tessera_types::{
    ChainId, Hash, ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID, LOCAL_NETWORK_ID,
};

/// Deterministic label hash, used for every synthetic identifier.
pub fn h(label: &str) -> Hash {
    Hash::sha256(label.as_bytes())
}

/// Install a tracing subscriber once per process, honoring `RUST_LOG`.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Default factoshis-per-credit rate used by harness blocks.
pub const TEST_EXCHANGE_RATE: u64 = 1_000;

/// A chain state plus the head bookkeeping needed to build the next valid
/// block set.
pub struct ChainHarness {
    pub state: ChainState,
    next_height: u32,
    d_prev: (Hash, Hash),
    a_prev: Hash,
    f_prev: (Hash, Hash),
    ec_prev: (Hash, Hash),
    eb_prev: BTreeMap<ChainId, (Hash, Hash, u32)>,
}

impl ChainHarness {
    /// A fresh local-net chain with nothing applied.
    pub fn new() -> Self {
        init_tracing();
        Self {
            state: ChainState::local_net(),
            next_height: 0,
            d_prev: (Hash::ZERO, Hash::ZERO),
            a_prev: Hash::ZERO,
            f_prev: (Hash::ZERO, Hash::ZERO),
            ec_prev: (Hash::ZERO, Hash::ZERO),
            eb_prev: BTreeMap::new(),
        }
    }

    /// Start a builder for the next height, pre-linked to all current heads.
    pub fn block(&self) -> BlockSetBuilder {
        BlockSetBuilder {
            height: self.next_height,
            exchange_rate: TEST_EXCHANGE_RATE,
            d_prev: self.d_prev,
            a_prev: self.a_prev,
            f_prev: self.f_prev,
            ec_prev: self.ec_prev,
            eb_prev: self.eb_prev.clone(),
            transactions: Vec::new(),
            ec_entries: Vec::new(),
            reveals: BTreeMap::new(),
            entries: Vec::new(),
            tx_counter: 0,
        }
    }

    /// Feed a set to the engine; head tracking advances only on acceptance.
    pub fn apply(&mut self, set: &BlockSet) -> Result<(), ReplayError> {
        self.state.process_block_set(set)?;
        self.d_prev = (set.directory.key_mr, set.directory.full_hash);
        self.a_prev = set.admin.back_ref_hash;
        self.f_prev = (set.factoid.key_mr, set.factoid.ledger_key_mr);
        self.ec_prev = (set.entry_credit.header_hash, set.entry_credit.full_hash);
        for eb in &set.entry_blocks {
            self.eb_prev
                .insert(eb.chain_id, (eb.key_mr, eb.full_hash, eb.sequence));
        }
        self.next_height = set.directory.header.height + 1;
        Ok(())
    }

    /// Apply `n` empty block sets in a row.
    pub fn advance(&mut self, n: u32) -> Result<(), ReplayError> {
        for _ in 0..n {
            let set = self.block().build();
            self.apply(&set)?;
        }
        Ok(())
    }

    pub fn height(&self) -> u32 {
        self.state.dblock_height()
    }
}

impl Default for ChainHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for one block set at a fixed height.
pub struct BlockSetBuilder {
    height: u32,
    exchange_rate: u64,
    d_prev: (Hash, Hash),
    a_prev: Hash,
    f_prev: (Hash, Hash),
    ec_prev: (Hash, Hash),
    eb_prev: BTreeMap<ChainId, (Hash, Hash, u32)>,
    transactions: Vec<Transaction>,
    ec_entries: Vec<EcBlockEntry>,
    reveals: BTreeMap<ChainId, Vec<Hash>>,
    entries: Vec<Entry>,
    tx_counter: u32,
}

impl BlockSetBuilder {
    fn next_tx_id(&mut self) -> Hash {
        self.tx_counter += 1;
        h(&format!("tx-{}-{}", self.height, self.tx_counter))
    }

    /// Override the factoid block's exchange rate.
    pub fn exchange_rate(mut self, rate: u64) -> Self {
        self.exchange_rate = rate;
        self
    }

    /// Mint factoshis to an address (coinbase-style output-only tx).
    pub fn grant(mut self, address: Hash, amount: u64) -> Self {
        let tx_id = self.next_tx_id();
        self.transactions.push(Transaction {
            tx_id,
            inputs: vec![],
            outputs: vec![TxIo { address, amount }],
            ec_outputs: vec![],
        });
        self
    }

    /// Move factoshis between two addresses.
    pub fn transfer(mut self, from: Hash, to: Hash, amount: u64) -> Self {
        let tx_id = self.next_tx_id();
        self.transactions.push(Transaction {
            tx_id,
            inputs: vec![TxIo {
                address: from,
                amount,
            }],
            outputs: vec![TxIo {
                address: to,
                amount,
            }],
            ec_outputs: vec![],
        });
        self
    }

    /// Spend factoshis on entry credits for `ec_key`. Returns the builder
    /// and the purchase transaction id.
    pub fn buy_credits(mut self, ec_key: Hash, factoshis: u64) -> (Self, Hash) {
        let tx_id = self.next_tx_id();
        self.transactions.push(Transaction {
            tx_id,
            inputs: vec![],
            outputs: vec![],
            ec_outputs: vec![EcOutput {
                ec_public_key: ec_key,
                amount: factoshis,
            }],
        });
        (self, tx_id)
    }

    /// Push a raw transaction, for tests that need exact shapes.
    pub fn transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }

    /// Grant entry credits directly (server-granted balance increase).
    pub fn balance_increase(mut self, ec_key: Hash, num_ec: u64) -> Self {
        let tx_id = self.next_tx_id();
        self.ec_entries.push(EcBlockEntry::BalanceIncrease {
            ec_public_key: ec_key,
            tx_id,
            num_ec,
        });
        self
    }

    /// Pay for a future reveal of `entry_hash` from `ec_key`.
    pub fn commit(mut self, ec_key: Hash, entry_hash: Hash, credits: u64) -> Self {
        let tx_id = self.next_tx_id();
        self.ec_entries.push(EcBlockEntry::EntryCommit(CommitBody {
            tx_id,
            ec_public_key: ec_key,
            entry_hash,
            credits,
        }));
        self
    }

    /// Reveal an entry hash on a chain.
    pub fn reveal(mut self, chain_id: ChainId, entry_hash: Hash) -> Self {
        self.reveals.entry(chain_id).or_default().push(entry_hash);
        self
    }

    /// Reveal a full entry (hash plus body), as identity chains need.
    pub fn reveal_entry(mut self, entry: Entry) -> Self {
        self.reveals
            .entry(entry.chain_id)
            .or_default()
            .push(entry.hash);
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> BlockSet {
        let height = self.height;
        let d_key_mr = h(&format!("dblock-{height}"));
        let a_back_ref = h(&format!("ablock-{height}"));
        let f_key_mr = h(&format!("fblock-{height}"));
        let f_ledger = h(&format!("fblock-ledger-{height}"));
        let ec_header = h(&format!("ecblock-{height}"));
        let ec_full = h(&format!("ecblock-full-{height}"));

        let mut entry_blocks = Vec::new();
        let mut dir_entries = vec![
            DirectoryEntry {
                chain_id: ADMIN_CHAIN_ID,
                key_mr: a_back_ref,
            },
            DirectoryEntry {
                chain_id: EC_CHAIN_ID,
                key_mr: ec_header,
            },
            DirectoryEntry {
                chain_id: FACTOID_CHAIN_ID,
                key_mr: f_key_mr,
            },
        ];
        for (chain_id, entry_hashes) in &self.reveals {
            let key_mr = h(&format!("eblock-{chain_id}-{height}"));
            let full_hash = h(&format!("eblock-full-{chain_id}-{height}"));
            let (prev_key_mr, prev_full_hash, sequence) = match self.eb_prev.get(chain_id) {
                Some((pk, pf, seq)) => (*pk, *pf, seq + 1),
                None => (Hash::ZERO, Hash::ZERO, 0),
            };
            dir_entries.push(DirectoryEntry {
                chain_id: *chain_id,
                key_mr,
            });
            entry_blocks.push(EntryBlock {
                chain_id: *chain_id,
                key_mr,
                full_hash,
                prev_key_mr,
                prev_full_hash,
                sequence,
                entry_hashes: entry_hashes.clone(),
            });
        }

        BlockSet {
            directory: DirectoryBlock {
                header: DBlockHeader {
                    network_id: LOCAL_NETWORK_ID,
                    prev_key_mr: self.d_prev.0,
                    prev_full_hash: self.d_prev.1,
                    height,
                    timestamp: 600_000 + u64::from(height) * 600,
                },
                key_mr: d_key_mr,
                full_hash: h(&format!("dblock-full-{height}")),
                header_bytes: d_key_mr.as_bytes()[..8].to_vec(),
                entries: dir_entries,
            },
            admin: AdminBlock {
                prev_back_ref_hash: self.a_prev,
                back_ref_hash: a_back_ref,
            },
            factoid: FactoidBlock {
                key_mr: f_key_mr,
                ledger_key_mr: f_ledger,
                prev_key_mr: self.f_prev.0,
                prev_ledger_key_mr: self.f_prev.1,
                height,
                exchange_rate: self.exchange_rate,
                transactions: self.transactions,
            },
            entry_credit: EcBlock {
                header_hash: ec_header,
                full_hash: ec_full,
                prev_header_hash: self.ec_prev.0,
                prev_full_hash: self.ec_prev.1,
                height,
                entries: self.ec_entries,
            },
            entry_blocks,
            entries: self.entries,
        }
    }
}
