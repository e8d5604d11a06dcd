//! Pre/post block hooks.
//!
//! A collaborator-visible error-recovery point bracketing each block set,
//! keyed by the directory block's primary index. Nodes use this to veto or
//! annotate specific historical blocks (e.g. operator-pinned overrides)
//! without the engine knowing why.

use crate::domain::errors::ReplayError;
use tessera_types::KeyMr;

pub trait BlockSetHooks {
    fn pre_block(&mut self, key_mr: &KeyMr, height: u32) -> Result<(), ReplayError> {
        let _ = (key_mr, height);
        Ok(())
    }

    fn post_block(&mut self, key_mr: &KeyMr, height: u32) -> Result<(), ReplayError> {
        let _ = (key_mr, height);
        Ok(())
    }
}

/// Default hooks: accept everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl BlockSetHooks for NoopHooks {}
