//! # Protocol Constants
//!
//! Network identifiers, well-known chain IDs, denomination constants, the
//! M2 protocol-switch height, and hard-coded main-net checkpoints.

use crate::hash::Hash;
use std::str::FromStr;

/// Main network identifier; every directory block header carries this.
pub const MAIN_NETWORK_ID: u32 = 0x7E55_E3A1;
/// Public test network identifier.
pub const TEST_NETWORK_ID: u32 = 0x7E55_E3A2;
/// Local development network identifier.
pub const LOCAL_NETWORK_ID: u32 = 0x7E55_E3A3;

/// Factoshis per factoid unit (fixed-point, 1e8).
pub const FACTOSHIS_PER_UNIT: u64 = 100_000_000;

/// Height at which the M2 protocol revision activated on main-net.
/// Several validation rules changed at this boundary (entry-credit block
/// height checks, commit expiration window).
pub const M2_SWITCH_HEIGHT: u32 = 71_664;

const fn tail_byte_chain(b: u8) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[31] = b;
    Hash(bytes)
}

/// Admin chain: 000...00a. Always the first entry of a directory block.
pub const ADMIN_CHAIN_ID: Hash = tail_byte_chain(0x0a);
/// Entry-credit chain: 000...00c. Always the second entry.
pub const EC_CHAIN_ID: Hash = tail_byte_chain(0x0c);
/// Factoid chain: 000...00f. Always the third entry.
pub const FACTOID_CHAIN_ID: Hash = tail_byte_chain(0x0f);

/// Chain IDs beginning with these bytes carry identity documents.
pub const IDENTITY_CHAIN_PREFIX: [u8; 3] = [0x88, 0x88, 0x88];

/// The identity registration chain, where root identities announce
/// themselves. Itself prefixed 0x888888 like all identity chains.
pub const IDENTITY_REGISTRATION_CHAIN_ID: Hash = Hash([
    0x88, 0x88, 0x88, 0xc3, 0xe1, 0x52, 0x7e, 0x3a, 0xc5, 0x99, 0x07, 0xe1, 0xd8, 0x5e, 0x1c,
    0x8c, 0x84, 0xe0, 0xb7, 0xc4, 0xa7, 0xf4, 0xa0, 0x3c, 0x0f, 0x2b, 0x6b, 0x0e, 0x3f, 0x8d,
    0x5a, 0x21,
]);

/// Whether a chain carries identity documents: the fixed registration chain
/// or any chain whose ID starts with 0x888888.
pub fn is_identity_chain(chain_id: &Hash) -> bool {
    chain_id.as_bytes()[..3] == IDENTITY_CHAIN_PREFIX
}

/// Hard-coded main-net checkpoints: (height, directory block KeyMR).
///
/// A directory block at a checkpointed height must carry exactly this KeyMR.
/// This defends a replaying node against deep-rollback attacks through a
/// compromised block store.
const MAIN_CHECKPOINTS: &[(u32, &str)] = &[
    (
        10_000,
        "2978237e42cd9e6c93296a04b3b2dbeb83b97ce2bd6b2272e10a0c0f41e8a2b4",
    ),
    (
        50_000,
        "c7a6f1bd2e04d9a93f51c8e6b07d4aa1390fe5c2d8417b6e5a02c9f3d1e84067",
    ),
    (
        100_000,
        "5d90a2c41f7b38e6d1c05a9b84e2f73c6a18d04b9e57c3f2081b6da4c5e9f310",
    ),
];

/// Look up the hard-coded checkpoint KeyMR for a height, if one exists.
pub fn checkpoint_for(height: u32) -> Option<Hash> {
    MAIN_CHECKPOINTS
        .iter()
        .find(|(h, _)| *h == height)
        .and_then(|(_, s)| Hash::from_str(s).ok())
}
