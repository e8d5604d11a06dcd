//! # In-Memory Identity Registry
//!
//! Default [`IdentityOps`] implementation: a map of identity records keyed
//! by root chain ID, plus a deferral queue for documents that arrive before
//! the identity chain they target. Blocks are not ordered for identity
//! convenience, so a key rotation can legally precede its identity-chain
//! announcement within the same block set; such documents park in the
//! queue and [`IdentityRegistry::process_old_entries`] retries them after
//! every block.

use crate::domain::identity::{
    IdentityChainDoc, IdentityError, NewBitcoinKeyDoc, NewBlockSigningKeyDoc,
    NewMatryoshkaHashDoc, RegisterIdentityDoc, RegisterServerManagementDoc,
};
use crate::ports::IdentityOps;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tessera_types::{ChainId, Hash, Timestamp};

/// A bitcoin key held by an identity, with its registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinKey {
    pub key_level: u8,
    pub key_type: u8,
    pub key: Vec<u8>,
    pub since: Timestamp,
}

/// Everything the registry knows about one root identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub chain_id: ChainId,
    /// The four declining-priority keys from the chain announcement.
    pub keys: Vec<Hash>,
    pub bitcoin_keys: Vec<BitcoinKey>,
    pub block_signing_key: Option<Vec<u8>>,
    pub block_signing_key_since: Option<Timestamp>,
    pub matryoshka_hash: Option<Hash>,
    pub created_at: u32,
    /// Height of the registration-chain entry, once seen.
    pub registered_at: Option<u32>,
    pub management_chain_id: Option<ChainId>,
    pub management_registered_at: Option<u32>,
}

impl IdentityRecord {
    fn new(chain_id: ChainId, keys: Vec<Hash>, created_at: u32) -> Self {
        Self {
            chain_id,
            keys,
            bitcoin_keys: Vec::new(),
            block_signing_key: None,
            block_signing_key_since: None,
            matryoshka_hash: None,
            created_at,
            registered_at: None,
            management_chain_id: None,
            management_registered_at: None,
        }
    }
}

/// A document parked until its target identity exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum DeferredApply {
    BitcoinKey {
        doc: NewBitcoinKeyDoc,
        timestamp: Timestamp,
    },
    BlockSigningKey {
        doc: NewBlockSigningKeyDoc,
        timestamp: Timestamp,
    },
    MatryoshkaHash {
        doc: NewMatryoshkaHashDoc,
        timestamp: Timestamp,
    },
    Register {
        doc: RegisterIdentityDoc,
        height: u32,
    },
    ServerManagement {
        doc: RegisterServerManagementDoc,
        chain_id: ChainId,
        height: u32,
    },
}

/// The default, fully in-memory identity manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityRegistry {
    identities: HashMap<ChainId, IdentityRecord>,
    deferred: Vec<DeferredApply>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self, chain_id: &ChainId) -> Option<&IdentityRecord> {
        self.identities.get(chain_id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Documents still waiting for their target identity.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Apply one deferred document, or park it again if the target is
    /// still missing.
    fn retry(&mut self, item: DeferredApply) -> Result<(), DeferredApply> {
        let applied = match &item {
            DeferredApply::BitcoinKey { doc, timestamp } => {
                self.set_bitcoin_key(doc, *timestamp).is_ok()
            }
            DeferredApply::BlockSigningKey { doc, timestamp } => {
                self.set_block_signing_key(doc, *timestamp).is_ok()
            }
            DeferredApply::MatryoshkaHash { doc, timestamp } => {
                self.set_matryoshka_hash(doc, *timestamp).is_ok()
            }
            DeferredApply::Register { doc, height } => self.set_registered(doc, *height).is_ok(),
            DeferredApply::ServerManagement {
                doc,
                chain_id,
                height,
            } => self.set_management(doc, chain_id, *height).is_ok(),
        };
        if applied {
            Ok(())
        } else {
            Err(item)
        }
    }

    fn set_bitcoin_key(
        &mut self,
        doc: &NewBitcoinKeyDoc,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        let record = self
            .identities
            .get_mut(&doc.root_identity_chain_id)
            .ok_or(IdentityError::UnknownIdentity(doc.root_identity_chain_id))?;
        // One key per (level, type) slot; a re-announcement replaces it.
        record
            .bitcoin_keys
            .retain(|k| (k.key_level, k.key_type) != (doc.key_level, doc.key_type));
        record.bitcoin_keys.push(BitcoinKey {
            key_level: doc.key_level,
            key_type: doc.key_type,
            key: doc.new_key.clone(),
            since: timestamp,
        });
        Ok(())
    }

    fn set_block_signing_key(
        &mut self,
        doc: &NewBlockSigningKeyDoc,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        let record = self
            .identities
            .get_mut(&doc.root_identity_chain_id)
            .ok_or(IdentityError::UnknownIdentity(doc.root_identity_chain_id))?;
        record.block_signing_key = Some(doc.new_public_key.clone());
        record.block_signing_key_since = Some(timestamp);
        Ok(())
    }

    fn set_matryoshka_hash(
        &mut self,
        doc: &NewMatryoshkaHashDoc,
        _timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        let record = self
            .identities
            .get_mut(&doc.root_identity_chain_id)
            .ok_or(IdentityError::UnknownIdentity(doc.root_identity_chain_id))?;
        record.matryoshka_hash = Some(doc.outermost_hash);
        Ok(())
    }

    fn set_registered(&mut self, doc: &RegisterIdentityDoc, height: u32) -> Result<(), IdentityError> {
        let record = self
            .identities
            .get_mut(&doc.identity_chain_id)
            .ok_or(IdentityError::UnknownIdentity(doc.identity_chain_id))?;
        record.registered_at.get_or_insert(height);
        Ok(())
    }

    fn set_management(
        &mut self,
        doc: &RegisterServerManagementDoc,
        chain_id: &ChainId,
        height: u32,
    ) -> Result<(), IdentityError> {
        let record = self
            .identities
            .get_mut(chain_id)
            .ok_or(IdentityError::UnknownIdentity(*chain_id))?;
        record.management_chain_id = Some(doc.subchain_id);
        record.management_registered_at.get_or_insert(height);
        Ok(())
    }
}

impl IdentityOps for IdentityRegistry {
    fn apply_identity_chain(
        &mut self,
        doc: IdentityChainDoc,
        chain_id: &ChainId,
        height: u32,
    ) -> Result<(), IdentityError> {
        // First announcement wins; later ones on the same chain are noise.
        self.identities
            .entry(*chain_id)
            .or_insert_with(|| IdentityRecord::new(*chain_id, doc.keys, height));
        Ok(())
    }

    fn apply_new_bitcoin_key(
        &mut self,
        doc: NewBitcoinKeyDoc,
        _chain_id: &ChainId,
        _height: u32,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        if let Err(err) = self.set_bitcoin_key(&doc, timestamp) {
            if matches!(err, IdentityError::UnknownIdentity(_)) {
                self.deferred.push(DeferredApply::BitcoinKey { doc, timestamp });
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    fn apply_new_block_signing_key(
        &mut self,
        doc: NewBlockSigningKeyDoc,
        _chain_id: &ChainId,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        if let Err(err) = self.set_block_signing_key(&doc, timestamp) {
            if matches!(err, IdentityError::UnknownIdentity(_)) {
                self.deferred
                    .push(DeferredApply::BlockSigningKey { doc, timestamp });
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    fn apply_new_matryoshka_hash(
        &mut self,
        doc: NewMatryoshkaHashDoc,
        _chain_id: &ChainId,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError> {
        if let Err(err) = self.set_matryoshka_hash(&doc, timestamp) {
            if matches!(err, IdentityError::UnknownIdentity(_)) {
                self.deferred
                    .push(DeferredApply::MatryoshkaHash { doc, timestamp });
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    fn apply_register_identity(
        &mut self,
        doc: RegisterIdentityDoc,
        height: u32,
    ) -> Result<(), IdentityError> {
        if let Err(err) = self.set_registered(&doc, height) {
            if matches!(err, IdentityError::UnknownIdentity(_)) {
                self.deferred.push(DeferredApply::Register { doc, height });
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    fn apply_register_server_management(
        &mut self,
        doc: RegisterServerManagementDoc,
        chain_id: &ChainId,
        height: u32,
    ) -> Result<(), IdentityError> {
        if let Err(err) = self.set_management(&doc, chain_id, height) {
            if matches!(err, IdentityError::UnknownIdentity(_)) {
                self.deferred.push(DeferredApply::ServerManagement {
                    doc,
                    chain_id: *chain_id,
                    height,
                });
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Retry deferred documents until a full pass makes no progress.
    fn process_old_entries(&mut self) -> Result<(), IdentityError> {
        loop {
            let pending = std::mem::take(&mut self.deferred);
            let before = pending.len();
            for item in pending {
                if let Err(parked) = self.retry(item) {
                    self.deferred.push(parked);
                }
            }
            if self.deferred.len() == before {
                return Ok(());
            }
        }
    }
}
