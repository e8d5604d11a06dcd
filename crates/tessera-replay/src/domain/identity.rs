//! # Identity Entry Decoding
//!
//! Entries on identity chains (chain ID prefix `0x888888`) carry identity
//! documents in their external IDs: `[version, type-tag, fields...]`. The
//! full identity grammar lives with the identity manager; this module only
//! decodes the envelope into a tagged [`IdentityEntry`] so the dispatch is
//! an exhaustive match instead of string comparisons scattered through the
//! pipeline.
//!
//! Decode failures are non-fatal: the pipeline logs and skips the entry.

use crate::domain::blocks::Entry;
use serde::{Deserialize, Serialize};
use std::str;
use tessera_types::{is_identity_chain, ChainId, Hash};
use thiserror::Error;

/// Non-fatal errors from identity decoding or application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("chain {0} is not an identity chain")]
    NotIdentityChain(ChainId),
    #[error("malformed identity entry: {0}")]
    Malformed(String),
    #[error("unsupported identity entry version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown identity entry type {0:?}")]
    UnknownType(String),
    #[error("unknown identity {0}")]
    UnknownIdentity(ChainId),
}

/// An identity chain announcement: the four declining-priority keys of a
/// new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityChainDoc {
    pub keys: Vec<Hash>,
}

/// A bitcoin key registered under a root identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBitcoinKeyDoc {
    pub root_identity_chain_id: ChainId,
    pub key_level: u8,
    pub key_type: u8,
    /// 20-byte bitcoin key payload.
    pub new_key: Vec<u8>,
}

/// A block signing key rotation for a root identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlockSigningKeyDoc {
    pub root_identity_chain_id: ChainId,
    /// 32-byte ed25519 public key payload.
    pub new_public_key: Vec<u8>,
}

/// A Matryoshka hash reveal-chain anchor update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatryoshkaHashDoc {
    pub root_identity_chain_id: ChainId,
    pub outermost_hash: Hash,
}

/// A root identity registering itself on the registration chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterIdentityDoc {
    pub identity_chain_id: ChainId,
}

/// A root identity registering (or re-pointing) its management subchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterServerManagementDoc {
    pub subchain_id: ChainId,
}

/// An identity document, decoded once from an entry's external IDs and
/// dispatched with an exhaustive match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityEntry {
    IdentityChain(IdentityChainDoc),
    NewBitcoinKey(NewBitcoinKeyDoc),
    NewBlockSigningKey(NewBlockSigningKeyDoc),
    NewMatryoshkaHash(NewMatryoshkaHashDoc),
    RegisterIdentity(RegisterIdentityDoc),
    RegisterServerManagement(RegisterServerManagementDoc),
}

impl IdentityEntry {
    /// Decode an identity document from an entry's external IDs.
    ///
    /// Layout: `ext_ids[0]` is a one-byte version (only 0 supported),
    /// `ext_ids[1]` the UTF-8 type tag, the rest type-specific fields.
    pub fn decode(entry: &Entry) -> Result<Self, IdentityError> {
        if !is_identity_chain(&entry.chain_id) {
            return Err(IdentityError::NotIdentityChain(entry.chain_id));
        }
        let ext_ids = &entry.ext_ids;
        if ext_ids.len() < 2 {
            return Err(IdentityError::Malformed(format!(
                "{} external ids, need at least 2",
                ext_ids.len()
            )));
        }
        if ext_ids[0].is_empty() {
            return Err(IdentityError::Malformed("empty version field".into()));
        }
        if ext_ids[0][0] != 0 {
            return Err(IdentityError::UnsupportedVersion(ext_ids[0][0]));
        }
        let tag = str::from_utf8(&ext_ids[1])
            .map_err(|_| IdentityError::Malformed("type tag is not utf-8".into()))?;

        match tag {
            "Identity Chain" => {
                // version, tag, 4 keys, nonce
                if ext_ids.len() < 6 {
                    return Err(IdentityError::Malformed(
                        "identity chain needs 4 keys".into(),
                    ));
                }
                let keys = ext_ids[2..6]
                    .iter()
                    .map(|k| hash_field(k, "identity key"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IdentityEntry::IdentityChain(IdentityChainDoc { keys }))
            }
            "New Bitcoin Key" => {
                // version, tag, root chain, key level, key type, key
                if ext_ids.len() < 6 {
                    return Err(IdentityError::Malformed("bitcoin key too short".into()));
                }
                let root = hash_field(&ext_ids[2], "root chain id")?;
                let key_level = byte_field(&ext_ids[3], "key level")?;
                let key_type = byte_field(&ext_ids[4], "key type")?;
                if ext_ids[5].len() != 20 {
                    return Err(IdentityError::Malformed(format!(
                        "bitcoin key is {} bytes, want 20",
                        ext_ids[5].len()
                    )));
                }
                Ok(IdentityEntry::NewBitcoinKey(NewBitcoinKeyDoc {
                    root_identity_chain_id: root,
                    key_level,
                    key_type,
                    new_key: ext_ids[5].clone(),
                }))
            }
            "New Block Signing Key" => {
                if ext_ids.len() < 4 {
                    return Err(IdentityError::Malformed("signing key too short".into()));
                }
                let root = hash_field(&ext_ids[2], "root chain id")?;
                if ext_ids[3].len() != 32 {
                    return Err(IdentityError::Malformed(format!(
                        "signing key is {} bytes, want 32",
                        ext_ids[3].len()
                    )));
                }
                Ok(IdentityEntry::NewBlockSigningKey(NewBlockSigningKeyDoc {
                    root_identity_chain_id: root,
                    new_public_key: ext_ids[3].clone(),
                }))
            }
            "New Matryoshka Hash" => {
                if ext_ids.len() < 4 {
                    return Err(IdentityError::Malformed("matryoshka hash too short".into()));
                }
                Ok(IdentityEntry::NewMatryoshkaHash(NewMatryoshkaHashDoc {
                    root_identity_chain_id: hash_field(&ext_ids[2], "root chain id")?,
                    outermost_hash: hash_field(&ext_ids[3], "outermost hash")?,
                }))
            }
            "Register Tessera Identity" => {
                if ext_ids.len() < 3 {
                    return Err(IdentityError::Malformed("registration too short".into()));
                }
                Ok(IdentityEntry::RegisterIdentity(RegisterIdentityDoc {
                    identity_chain_id: hash_field(&ext_ids[2], "identity chain id")?,
                }))
            }
            "Register Server Management" => {
                if ext_ids.len() < 3 {
                    return Err(IdentityError::Malformed("registration too short".into()));
                }
                Ok(IdentityEntry::RegisterServerManagement(
                    RegisterServerManagementDoc {
                        subchain_id: hash_field(&ext_ids[2], "subchain id")?,
                    },
                ))
            }
            other => Err(IdentityError::UnknownType(other.to_string())),
        }
    }
}

fn hash_field(bytes: &[u8], what: &str) -> Result<Hash, IdentityError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| IdentityError::Malformed(format!("{what} is {} bytes, want 32", bytes.len())))?;
    Ok(Hash::new(arr))
}

fn byte_field(bytes: &[u8], what: &str) -> Result<u8, IdentityError> {
    if bytes.len() != 1 {
        return Err(IdentityError::Malformed(format!(
            "{what} is {} bytes, want 1",
            bytes.len()
        )));
    }
    Ok(bytes[0])
}
