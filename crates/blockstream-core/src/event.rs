//! Add/remove notifications produced by reconciliation.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::types::{Block, Log};

/// One announcement, in the order it must reach subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    BlockAdded(Block),
    BlockRemoved(Block),
    /// Logs appended for a newly added block (possibly none).
    LogsAdded { block_hash: String, logs: Vec<Log> },
    /// Logs retracted for a removed block, most recent first (possibly none).
    LogsRemoved { block_hash: String, logs: Vec<Log> },
}

impl ChainEvent {
    /// The hash of the block this event is about.
    pub fn block_hash(&self) -> &str {
        match self {
            Self::BlockAdded(b) | Self::BlockRemoved(b) => &b.hash,
            Self::LogsAdded { block_hash, .. } | Self::LogsRemoved { block_hash, .. } => block_hash,
        }
    }
}

/// Receives events as reconciliation produces them.
pub trait EventSink: Send {
    fn emit(&mut self, event: ChainEvent);
}

impl EventSink for Vec<ChainEvent> {
    fn emit(&mut self, event: ChainEvent) {
        self.push(event);
    }
}

impl EventSink for VecDeque<ChainEvent> {
    fn emit(&mut self, event: ChainEvent) {
        self.push_back(event);
    }
}

/// Hooks the block reconciler calls for every block it adds or removes.
///
/// An error aborts the reconciliation.
#[async_trait]
pub trait BlockEvents: Send {
    async fn block_added(&mut self, block: &Block) -> Result<(), ReconcileError>;
    async fn block_removed(&mut self, block: &Block) -> Result<(), ReconcileError>;
}

/// Forwards block additions and removals straight into an [`EventSink`].
pub struct EmitBlocks<'a, S: ?Sized>(pub &'a mut S);

#[async_trait]
impl<S: EventSink + ?Sized> BlockEvents for EmitBlocks<'_, S> {
    async fn block_added(&mut self, block: &Block) -> Result<(), ReconcileError> {
        self.0.emit(ChainEvent::BlockAdded(block.clone()));
        Ok(())
    }

    async fn block_removed(&mut self, block: &Block) -> Result<(), ReconcileError> {
        self.0.emit(ChainEvent::BlockRemoved(block.clone()));
        Ok(())
    }
}
