//! The committed block and log history.
//!
//! Only the worker writes it, and only after a reconciliation succeeded, so
//! readers never see a half-applied step.

use std::sync::{PoisonError, RwLock};

use blockstream_core::{Block, BlockAndLogHistory};

#[derive(Debug, Default)]
pub(crate) struct Checkpoint {
    state: RwLock<BlockAndLogHistory>,
}

impl Checkpoint {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A copy to reconcile against.
    pub(crate) fn snapshot(&self) -> BlockAndLogHistory {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn commit(&self, history: BlockAndLogHistory) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = history;
    }

    pub(crate) fn head(&self) -> Option<Block> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blocks
            .head()
            .cloned()
    }
}
