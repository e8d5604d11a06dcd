//! # tessera-replay
//!
//! Deterministic state-replay and validation engine for the Tessera chain.
//!
//! ## Role in System
//!
//! - **Consensus-Critical**: Given the block sets of a chain in height
//!   order, reconstructs balances, chain heads, outstanding entry
//!   commitments, and identity records exactly as every honest node would,
//!   or rejects the block set with a specific error.
//! - **Purely In-Process**: No wire protocol, no storage, no I/O. The
//!   node's fetch loop materializes one full block set per height and
//!   feeds it to [`ChainState::process_block_set`].
//!
//! ## Pipeline
//!
//! ```text
//! BlockSet ──→ pre-block hook
//!                  │
//!                  ↓
//!          [DBlock validator] ──→ [ABlock] ──→ [FBlock] ──→ [ECBlock]
//!                                                               │
//!                                                               ↓
//!                                                     [EBlocks + entries]
//!                                                               │
//!                            identity dispatch ←────────────────┤
//!                            commit expiration sweep ←──────────┤
//!                                                               ↓
//!                                                      post-block hook
//! ```
//!
//! Failure at any stage aborts the call. Mutation happens on a staged clone
//! that only replaces the live state on success, so a rejected block set
//! leaves the state byte-for-byte untouched.
//!
//! ## Ownership
//!
//! `ChainState` is not internally concurrent: one caller, one height at a
//! time. Speculative replicas (fork evaluation) are plain `clone()`s.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::IdentityRegistry;
pub use domain::*;
pub use ports::{BlockSetHooks, IdentityOps, NoopHooks};
