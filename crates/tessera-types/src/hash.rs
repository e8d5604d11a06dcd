//! # Hash Primitive
//!
//! 32-byte hash newtype used for every identifier on the chain: block
//! KeyMRs, chain IDs, entry hashes, addresses, and EC public keys.
//!
//! ## Minute Markers
//!
//! Inside entry blocks, a hash whose first 31 bytes are zero is not an entry
//! hash but a minute marker: the last byte is the minute number (1-10) of
//! the ten-minute block window that just elapsed.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of all chain hashes in bytes.
pub const HASH_LENGTH: usize = 32;

/// Errors parsing a hash from its hex representation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("invalid hash length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// A 32-byte hash.
///
/// Serializes as a 64-character lowercase hex string, which keeps JSON
/// state dumps readable and lets hashes act as JSON map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl Hash {
    /// The all-zero hash, used as the previous-hash of genesis blocks.
    pub const ZERO: Hash = Hash([0u8; HASH_LENGTH]);

    pub fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// SHA-256 of arbitrary data.
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// A minute marker is a hash with all but the last byte zero; the last
    /// byte is the minute number.
    pub fn is_minute_marker(&self) -> bool {
        self.0[..HASH_LENGTH - 1] == [0u8; HASH_LENGTH - 1]
    }

    /// The last byte of the hash, read as a minute number.
    pub fn to_minute(&self) -> u8 {
        self.0[HASH_LENGTH - 1]
    }

    /// Construct the minute marker for minute `m`.
    pub fn minute_marker(m: u8) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        bytes[HASH_LENGTH - 1] = m;
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_LENGTH * 2 {
            return Err(HashParseError::InvalidLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(de::Error::custom)
    }
}
