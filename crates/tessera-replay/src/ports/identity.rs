//! Identity manager boundary.
//!
//! The engine decodes identity documents and forwards them here; everything
//! about how identities are stored, validated against signing keys, or
//! superseded is the collaborator's business. Errors returned from the
//! `apply_*` methods never abort a block — the pipeline logs and moves on.

use crate::domain::identity::{
    IdentityChainDoc, IdentityError, NewBitcoinKeyDoc, NewBlockSigningKeyDoc,
    NewMatryoshkaHashDoc, RegisterIdentityDoc, RegisterServerManagementDoc,
};
use tessera_types::{ChainId, Timestamp};

/// Operations the replay engine invokes on the identity manager.
///
/// `Clone` is required because the engine stages every block set on a
/// cloned state (identity state included) and commits only on success.
pub trait IdentityOps: Clone {
    fn apply_identity_chain(
        &mut self,
        doc: IdentityChainDoc,
        chain_id: &ChainId,
        height: u32,
    ) -> Result<(), IdentityError>;

    fn apply_new_bitcoin_key(
        &mut self,
        doc: NewBitcoinKeyDoc,
        chain_id: &ChainId,
        height: u32,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError>;

    fn apply_new_block_signing_key(
        &mut self,
        doc: NewBlockSigningKeyDoc,
        chain_id: &ChainId,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError>;

    fn apply_new_matryoshka_hash(
        &mut self,
        doc: NewMatryoshkaHashDoc,
        chain_id: &ChainId,
        timestamp: Timestamp,
    ) -> Result<(), IdentityError>;

    fn apply_register_identity(
        &mut self,
        doc: RegisterIdentityDoc,
        height: u32,
    ) -> Result<(), IdentityError>;

    fn apply_register_server_management(
        &mut self,
        doc: RegisterServerManagementDoc,
        chain_id: &ChainId,
        height: u32,
    ) -> Result<(), IdentityError>;

    /// Deferred re-application hook, run once per block after all entry
    /// blocks are processed.
    fn process_old_entries(&mut self) -> Result<(), IdentityError>;
}
