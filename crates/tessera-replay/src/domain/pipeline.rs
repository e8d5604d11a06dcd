//! # Block Pipeline
//!
//! The five ordered validators plus entry consumption, identity dispatch,
//! and the commit-expiration sweep.
//!
//! [`ChainState::process_block_set`] is the atomic entry point: it stages
//! every mutation on a clone and only replaces the live state when the
//! whole set validates. The individual `process_*` validators are public
//! for callers that drive stages directly (audits, targeted tests) — they
//! mutate in place and make no atomicity promise on their own.

use crate::domain::blocks::{
    AdminBlock, BlockSet, DirectoryBlock, EcBlock, EcBlockEntry, EntryBlock, Entry, FactoidBlock,
    Transaction,
};
use crate::domain::errors::{BlockKind, ReplayError};
use crate::domain::identity::IdentityEntry;
use crate::domain::state::{purchase_key, ChainState, EBlockHead};
use crate::ports::{BlockSetHooks, IdentityOps, NoopHooks};
use std::collections::{HashMap, HashSet};
use tessera_types::{
    checkpoint_for, is_identity_chain, Hash, TxId, ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID,
    M2_SWITCH_HEIGHT,
};

impl<I: IdentityOps> ChainState<I> {
    /// Validate and apply one fully materialized block set.
    ///
    /// On error the state is left exactly as it was before the call.
    pub fn process_block_set(&mut self, set: &BlockSet) -> Result<(), ReplayError> {
        self.process_block_set_with_hooks(set, &mut NoopHooks)
    }

    /// [`ChainState::process_block_set`] with caller-supplied pre/post
    /// block hooks.
    pub fn process_block_set_with_hooks(
        &mut self,
        set: &BlockSet,
        hooks: &mut dyn BlockSetHooks,
    ) -> Result<(), ReplayError> {
        let mut staged = self.clone();
        staged.apply_block_set(set, hooks)?;
        *self = staged;
        Ok(())
    }

    fn apply_block_set(
        &mut self,
        set: &BlockSet,
        hooks: &mut dyn BlockSetHooks,
    ) -> Result<(), ReplayError> {
        hooks.pre_block(&set.directory.key_mr, set.directory.header.height)?;

        self.process_dblock(&set.directory)?;
        self.process_ablock(&set.admin)?;
        self.process_fblock(&set.factoid)?;
        self.process_ecblock(&set.entry_credit)?;
        self.process_eblocks(&set.entry_blocks, &set.entries)?;

        hooks.post_block(&set.directory.key_mr, self.dblock_height)?;

        tracing::debug!(
            "[tessera-replay] accepted block {} at height {}",
            set.directory.key_mr,
            self.dblock_height
        );
        Ok(())
    }

    /// Validate and advance the directory-block head.
    pub fn process_dblock(&mut self, block: &DirectoryBlock) -> Result<(), ReplayError> {
        let header = &block.header;

        // Height 0 bypasses the sequencing check: genesis.
        if header.height != 0 && header.height != self.dblock_height + 1 {
            return Err(ReplayError::WrongHeight {
                block: BlockKind::Directory,
                expected: self.dblock_height + 1,
                got: header.height,
            });
        }
        if self.dblock_head_key_mr != header.prev_key_mr {
            return Err(ReplayError::PrevKeyMrMismatch {
                block: BlockKind::Directory,
                expected: self.dblock_head_key_mr,
                got: header.prev_key_mr,
            });
        }
        if self.dblock_head_hash != header.prev_full_hash {
            return Err(ReplayError::PrevHashMismatch {
                block: BlockKind::Directory,
                expected: self.dblock_head_hash,
                got: header.prev_full_hash,
            });
        }
        if self.network_id != header.network_id {
            return Err(ReplayError::NetworkMismatch {
                expected: self.network_id,
                got: header.network_id,
            });
        }
        if self.is_main_net() {
            if let Some(expected) = checkpoint_for(header.height) {
                if block.key_mr != expected {
                    return Err(ReplayError::CheckpointMismatch {
                        height: header.height,
                        expected,
                        got: block.key_mr,
                    });
                }
            }
        }
        if block.entries.len() < 3 {
            return Err(ReplayError::TooFewDirectoryEntries {
                got: block.entries.len(),
            });
        }
        let system_chains = [ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID];
        for (position, expected) in system_chains.iter().enumerate() {
            if block.entries[position].chain_id != *expected {
                return Err(ReplayError::MisplacedSystemChain {
                    position,
                    expected: *expected,
                    got: block.entries[position].chain_id,
                });
            }
        }
        let mut seen = HashSet::with_capacity(block.entries.len());
        for entry in &block.entries {
            if !seen.insert(entry.chain_id) {
                return Err(ReplayError::DuplicateChainId {
                    chain_id: entry.chain_id,
                });
            }
        }

        self.dblock_head_key_mr = block.key_mr;
        self.dblock_head_hash = block.full_hash;
        self.dblock_height = header.height;
        self.dblock_timestamp = header.timestamp;
        self.dblock_header_bytes = block.header_bytes.clone();
        for entry in &block.entries {
            self.block_heads.insert(entry.chain_id, entry.key_mr);
        }
        Ok(())
    }

    /// Validate and advance the admin-block back-reference chain.
    pub fn process_ablock(&mut self, block: &AdminBlock) -> Result<(), ReplayError> {
        if self.ablock_head_ref_hash != block.prev_back_ref_hash {
            return Err(ReplayError::PrevHashMismatch {
                block: BlockKind::Admin,
                expected: self.ablock_head_ref_hash,
                got: block.prev_back_ref_hash,
            });
        }
        self.ablock_head_ref_hash = block.back_ref_hash;
        Ok(())
    }

    /// Validate the factoid block and replay its transactions into the
    /// balance maps.
    pub fn process_fblock(&mut self, block: &FactoidBlock) -> Result<(), ReplayError> {
        if self.fblock_head_key_mr != block.prev_key_mr {
            return Err(ReplayError::PrevKeyMrMismatch {
                block: BlockKind::Factoid,
                expected: self.fblock_head_key_mr,
                got: block.prev_key_mr,
            });
        }
        if self.fblock_head_hash != block.prev_ledger_key_mr {
            return Err(ReplayError::PrevHashMismatch {
                block: BlockKind::Factoid,
                expected: self.fblock_head_hash,
                got: block.prev_ledger_key_mr,
            });
        }
        if block.height != self.dblock_height {
            return Err(ReplayError::WrongHeight {
                block: BlockKind::Factoid,
                expected: self.dblock_height,
                got: block.height,
            });
        }
        for tx in &block.transactions {
            self.apply_transaction(tx, block.exchange_rate)?;
        }
        self.fblock_head_key_mr = block.key_mr;
        self.fblock_head_hash = block.ledger_key_mr;
        self.exchange_rate = block.exchange_rate;
        Ok(())
    }

    fn apply_transaction(&mut self, tx: &Transaction, block_rate: u64) -> Result<(), ReplayError> {
        for input in &tx.inputs {
            let balance = self.fct_balance(&input.address);
            let amount = i64::try_from(input.amount).map_err(|_| ReplayError::BalanceOverflow {
                address: input.address,
            })?;
            if balance < amount {
                return Err(ReplayError::InsufficientFactoids {
                    address: input.address,
                    balance,
                    needed: input.amount,
                });
            }
            self.f_balances.insert(input.address, balance - amount);
        }
        for output in &tx.outputs {
            let balance = self.fct_balance(&output.address);
            let amount = i64::try_from(output.amount).map_err(|_| ReplayError::BalanceOverflow {
                address: output.address,
            })?;
            let next = balance.checked_add(amount).ok_or(ReplayError::BalanceOverflow {
                address: output.address,
            })?;
            self.f_balances.insert(output.address, next);
        }
        // Purchases settle at the rate in force when the block began; a
        // fresh chain falls back to the genesis block's own rate.
        let rate = if self.exchange_rate != 0 {
            self.exchange_rate
        } else {
            block_rate
        };
        for (index, ec_out) in tx.ec_outputs.iter().enumerate() {
            if rate == 0 {
                return Err(ReplayError::ZeroExchangeRate { tx_id: tx.tx_id });
            }
            let num_ec = ec_out.amount / rate; // truncating conversion
            let balance = self.ec_balances.entry(ec_out.ec_public_key).or_insert(0);
            *balance = balance
                .checked_add(num_ec)
                .ok_or(ReplayError::BalanceOverflow {
                    address: ec_out.ec_public_key,
                })?;
            self.ec_purchases
                .insert(purchase_key(&tx.tx_id, index), num_ec);
        }
        Ok(())
    }

    /// Validate the entry-credit block and replay its entries into the EC
    /// balances and the commit pool.
    pub fn process_ecblock(&mut self, block: &EcBlock) -> Result<(), ReplayError> {
        if self.ecblock_head_key_mr != block.prev_header_hash {
            return Err(ReplayError::PrevKeyMrMismatch {
                block: BlockKind::EntryCredit,
                expected: self.ecblock_head_key_mr,
                got: block.prev_header_hash,
            });
        }
        if self.ecblock_head_hash != block.prev_full_hash {
            return Err(ReplayError::PrevHashMismatch {
                block: BlockKind::EntryCredit,
                expected: self.ecblock_head_hash,
                got: block.prev_full_hash,
            });
        }
        // Historical leniency: the height check only exists from the M2
        // switch onward. Preserved exactly; do not "fix".
        if self.dblock_height >= M2_SWITCH_HEIGHT && block.height != self.dblock_height {
            return Err(ReplayError::WrongHeight {
                block: BlockKind::EntryCredit,
                expected: self.dblock_height,
                got: block.height,
            });
        }
        check_ec_minute_numbers(block)?;
        for entry in &block.entries {
            self.process_ec_entry(entry)?;
        }
        self.ecblock_head_key_mr = block.header_hash;
        self.ecblock_head_hash = block.full_hash;
        Ok(())
    }

    /// Replay one entry-credit block entry.
    pub fn process_ec_entry(&mut self, entry: &EcBlockEntry) -> Result<(), ReplayError> {
        match entry {
            EcBlockEntry::MinuteNumber(_) => Ok(()),
            EcBlockEntry::BalanceIncrease {
                ec_public_key,
                num_ec,
                ..
            } => {
                let balance = self.ec_balances.entry(*ec_public_key).or_insert(0);
                *balance = balance
                    .checked_add(*num_ec)
                    .ok_or(ReplayError::BalanceOverflow {
                        address: *ec_public_key,
                    })?;
                Ok(())
            }
            EcBlockEntry::EntryCommit(commit) | EcBlockEntry::ChainCommit(commit) => {
                let balance = self.ec_balance(&commit.ec_public_key);
                if balance < commit.credits {
                    return Err(ReplayError::InsufficientCredits {
                        key: commit.ec_public_key,
                        balance,
                        needed: commit.credits,
                    });
                }
                self.ec_balances
                    .insert(commit.ec_public_key, balance - commit.credits);
                self.push_commit(commit.entry_hash, commit.tx_id);
                Ok(())
            }
        }
    }

    /// Queue a paid commit for a future reveal. If the entry was already
    /// flagged missing, the commit resolves the diagnostic instead of
    /// queueing.
    pub fn push_commit(&mut self, entry_hash: Hash, commit_tx_id: TxId) {
        if self.missing_entries.is_missing(&entry_hash) {
            self.missing_entries
                .record_found(&entry_hash, commit_tx_id, self.dblock_height);
            return;
        }
        self.commits.push(entry_hash, commit_tx_id, self.dblock_height);
    }

    /// Process all entry blocks of the set, run the deferred identity
    /// hook, then the commit-expiration sweep.
    pub fn process_eblocks(
        &mut self,
        eblocks: &[EntryBlock],
        entries: &[Entry],
    ) -> Result<(), ReplayError> {
        let mut seen = HashSet::with_capacity(eblocks.len());
        for eblock in eblocks {
            if !seen.insert(eblock.chain_id) {
                return Err(ReplayError::DuplicateChainId {
                    chain_id: eblock.chain_id,
                });
            }
        }
        let entry_map: HashMap<Hash, &Entry> = entries.iter().map(|e| (e.hash, e)).collect();
        for eblock in eblocks {
            self.process_eblock(eblock, &entry_map)?;
        }
        if let Err(err) = self.identity.process_old_entries() {
            tracing::warn!("[tessera-replay] deferred identity entries failed: {err}");
        }
        let expired = self
            .commits
            .clear_expired(self.dblock_height, self.is_main_net());
        self.metrics.expired_commits += expired;
        Ok(())
    }

    /// Validate one entry block and consume its entries against the
    /// commit pool.
    pub fn process_eblock(
        &mut self,
        eblock: &EntryBlock,
        entry_map: &HashMap<Hash, &Entry>,
    ) -> Result<(), ReplayError> {
        check_eblock_minute_numbers(eblock)?;

        let head = self
            .eblock_heads
            .get(&eblock.chain_id)
            .copied()
            .unwrap_or_default();
        if head.key_mr != eblock.prev_key_mr {
            return Err(ReplayError::PrevKeyMrMismatch {
                block: BlockKind::Entry,
                expected: head.key_mr,
                got: eblock.prev_key_mr,
            });
        }
        if head.full_hash != eblock.prev_full_hash {
            return Err(ReplayError::PrevHashMismatch {
                block: BlockKind::Entry,
                expected: head.full_hash,
                got: eblock.prev_full_hash,
            });
        }
        if eblock.sequence != 0 && head.sequence != eblock.sequence - 1 {
            return Err(ReplayError::WrongEBlockSequence {
                chain_id: eblock.chain_id,
                expected: head.sequence + 1,
                got: eblock.sequence,
            });
        }
        self.eblock_heads.insert(
            eblock.chain_id,
            EBlockHead {
                key_mr: eblock.key_mr,
                full_hash: eblock.full_hash,
                sequence: eblock.sequence,
            },
        );

        for hash in &eblock.entry_hashes {
            self.process_entry_hash(hash, eblock)?;
        }

        if is_identity_chain(&eblock.chain_id) {
            self.process_identity_block(eblock, entry_map);
        }
        Ok(())
    }

    /// Consume one revealed entry hash against the commit pool.
    ///
    /// Minute markers pass through; every real entry must consume exactly
    /// one live commit, oldest first.
    pub fn process_entry_hash(
        &mut self,
        hash: &Hash,
        eblock: &EntryBlock,
    ) -> Result<(), ReplayError> {
        if hash.is_minute_marker() {
            return Ok(());
        }
        self.metrics.total_entries += 1;

        let (commit, expired) =
            self.commits
                .pop_live(hash, self.dblock_height, self.is_main_net());
        self.metrics.expired_commits += expired;

        match commit {
            Some(commit) => {
                self.metrics.note_reveal_gap(self.dblock_height - commit.height);
                Ok(())
            }
            None => {
                self.missing_entries
                    .record_missing(*hash, self.dblock_head_key_mr, self.dblock_height);
                Err(ReplayError::UncommittedEntry {
                    entry_hash: *hash,
                    eblock: eblock.key_mr,
                    height: self.dblock_height,
                })
            }
        }
    }

    /// Whether a live (unexpired) commit exists for an entry hash.
    pub fn has_free_commit(&self, entry_hash: &Hash) -> bool {
        self.commits
            .has_live_commit(entry_hash, self.dblock_height, self.is_main_net())
    }

    /// Whether a reveal of this hash would be accepted right now.
    pub fn can_process_entry_hash(&self, entry_hash: &Hash) -> bool {
        entry_hash.is_minute_marker() || self.has_free_commit(entry_hash)
    }

    fn process_identity_block(&mut self, eblock: &EntryBlock, entry_map: &HashMap<Hash, &Entry>) {
        let height = self.dblock_height;
        let timestamp = self.dblock_timestamp;
        for hash in eblock.real_entry_hashes() {
            let Some(entry) = entry_map.get(hash) else {
                tracing::warn!(
                    "[tessera-replay] identity entry {} of chain {} not in block set",
                    hash,
                    eblock.chain_id
                );
                continue;
            };
            let doc = match IdentityEntry::decode(entry) {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!("[tessera-replay] skipping identity entry {hash}: {err}");
                    continue;
                }
            };
            let result = match doc {
                IdentityEntry::IdentityChain(d) => {
                    self.identity.apply_identity_chain(d, &eblock.chain_id, height)
                }
                IdentityEntry::NewBitcoinKey(d) => {
                    self.identity
                        .apply_new_bitcoin_key(d, &eblock.chain_id, height, timestamp)
                }
                IdentityEntry::NewBlockSigningKey(d) => {
                    self.identity
                        .apply_new_block_signing_key(d, &eblock.chain_id, timestamp)
                }
                IdentityEntry::NewMatryoshkaHash(d) => {
                    self.identity
                        .apply_new_matryoshka_hash(d, &eblock.chain_id, timestamp)
                }
                IdentityEntry::RegisterIdentity(d) => {
                    self.identity.apply_register_identity(d, height)
                }
                IdentityEntry::RegisterServerManagement(d) => self
                    .identity
                    .apply_register_server_management(d, &eblock.chain_id, height),
            };
            if let Err(err) = result {
                tracing::warn!("[tessera-replay] identity apply failed for {hash}: {err}");
            }
        }
    }
}

/// Minute markers within an entry block must be strictly increasing
/// integers in 1..=10.
fn check_eblock_minute_numbers(eblock: &EntryBlock) -> Result<(), ReplayError> {
    let mut last = 0u8;
    for (position, hash) in eblock.entry_hashes.iter().enumerate() {
        if !hash.is_minute_marker() {
            continue;
        }
        let minute = hash.to_minute();
        if !(1..=10).contains(&minute) {
            return Err(ReplayError::InvalidMinuteNumber {
                block: BlockKind::Entry,
                position,
                minute,
            });
        }
        if minute <= last {
            return Err(ReplayError::OutOfOrderMinute {
                block: BlockKind::Entry,
                position,
                minute,
                last,
            });
        }
        last = minute;
    }
    Ok(())
}

/// Same rule for the minute-number entries of an entry-credit block.
fn check_ec_minute_numbers(block: &EcBlock) -> Result<(), ReplayError> {
    let mut last = 0u8;
    for (position, entry) in block.entries.iter().enumerate() {
        let EcBlockEntry::MinuteNumber(minute) = entry else {
            continue;
        };
        if !(1..=10).contains(minute) {
            return Err(ReplayError::InvalidMinuteNumber {
                block: BlockKind::EntryCredit,
                position,
                minute: *minute,
            });
        }
        if *minute <= last {
            return Err(ReplayError::OutOfOrderMinute {
                block: BlockKind::EntryCredit,
                position,
                minute: *minute,
                last,
            });
        }
        last = *minute;
    }
    Ok(())
}
