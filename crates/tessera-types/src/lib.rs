//! # Tessera Types Crate
//!
//! Shared primitive types for the Tessera chain.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate primitive types (hashes,
//!   chain identifiers, network identifiers) are defined here.
//! - **Hex at the Boundary**: Hashes serialize as 64-character hex strings so
//!   that JSON state dumps and map keys stay human-readable.
//! - **Protocol Constants Live Here**: Well-known chain IDs, network IDs,
//!   the M2 switch height, and main-net checkpoints are compile-time data,
//!   not configuration.

pub mod constants;
pub mod hash;

pub use constants::*;
pub use hash::{Hash, HashParseError};

/// Unix timestamp in seconds since epoch.
pub type Timestamp = u64;

/// Chain identifier (first entry of a chain defines it).
pub type ChainId = Hash;

/// Key Merkle root, a block's primary hash-chain identifier.
pub type KeyMr = Hash;

/// Transaction identifier.
pub type TxId = Hash;

/// Factoid address (RCD hash).
pub type FctAddress = Hash;

/// Entry-credit public key.
pub type EcPublicKey = Hash;
