//! # Balance Ledger
//!
//! Independent audit-replay ledger for factoid balances. Deliberately
//! decoupled from [`crate::domain::state::ChainState`]'s own balance maps:
//! the two replay the same factoid blocks through different code paths and
//! can be cross-checked against each other.
//!
//! Every processed block appends one immutable [`BalanceDelta`] — the net
//! per-address movement of that block — supporting point-in-time balance
//! reconstruction.

use crate::domain::blocks::FactoidBlock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tessera_types::FctAddress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("address {address} balance would go below zero ({balance} + {change})")]
    BalanceUnderflow {
        address: FctAddress,
        balance: i64,
        change: i64,
    },
    #[error("amount {amount} does not fit signed 64-bit arithmetic")]
    AmountOverflow { amount: u64 },
}

/// An address's running balance and the height at which it last moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub balance: i64,
    /// Height of the last delta that touched this address.
    pub last_delta_index: u32,
}

/// Net per-address movement of one factoid block. Ordered map so dumps and
/// serialized audit trails are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub height: u32,
    pub changes: BTreeMap<FctAddress, i64>,
}

impl BalanceDelta {
    fn new(height: u32) -> Self {
        Self {
            height,
            changes: BTreeMap::new(),
        }
    }

    fn add(&mut self, address: FctAddress, change: i64) {
        *self.changes.entry(address).or_insert(0) += change;
    }
}

/// Replays factoid blocks into per-address balances with per-block delta
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLedger {
    balances: HashMap<FctAddress, AddressBalance>,
    /// Append-only audit trail, one delta per processed block.
    deltas: Vec<BalanceDelta>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate the block's net per-address delta, validate that folding
    /// it keeps every balance non-negative, then apply and record it.
    ///
    /// On error nothing is applied: validation runs against a scratch view
    /// before any balance moves.
    pub fn process_fblock(&mut self, block: &FactoidBlock) -> Result<(), LedgerError> {
        let mut delta = BalanceDelta::new(block.height);
        for tx in &block.transactions {
            for input in &tx.inputs {
                delta.add(input.address, -signed(input.amount)?);
            }
            for output in &tx.outputs {
                delta.add(output.address, signed(output.amount)?);
            }
            // EC purchases consume the already-debited inputs; no factoid
            // address is credited for them.
        }

        // Validate before mutating.
        for (address, change) in &delta.changes {
            let balance = self.balance_of(address);
            let next = balance.checked_add(*change).ok_or(LedgerError::AmountOverflow {
                amount: change.unsigned_abs(),
            })?;
            if next < 0 {
                return Err(LedgerError::BalanceUnderflow {
                    address: *address,
                    balance,
                    change: *change,
                });
            }
        }

        for (address, change) in &delta.changes {
            let entry = self.balances.entry(*address).or_default();
            entry.balance += change;
            entry.last_delta_index = block.height;
        }
        self.deltas.push(delta);
        Ok(())
    }

    pub fn balance_of(&self, address: &FctAddress) -> i64 {
        self.balances.get(address).map_or(0, |b| b.balance)
    }

    pub fn address_balance(&self, address: &FctAddress) -> Option<&AddressBalance> {
        self.balances.get(address)
    }

    /// The audit trail, in processing order.
    pub fn deltas(&self) -> &[BalanceDelta] {
        &self.deltas
    }

    pub fn balances(&self) -> &HashMap<FctAddress, AddressBalance> {
        &self.balances
    }

    /// Binary snapshot for checkpointing.
    pub fn snapshot(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn restore(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Human-readable dump of balances and the audit trail.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn signed(amount: u64) -> Result<i64, LedgerError> {
    i64::try_from(amount).map_err(|_| LedgerError::AmountOverflow { amount })
}
