//! Block and log reconciliation composed into one step.

use async_trait::async_trait;

use crate::block_reconciler::reconcile_block_history;
use crate::error::ReconcileError;
use crate::event::{BlockEvents, ChainEvent, EventSink};
use crate::history::{BlockAndLogHistory, LogHistory};
use crate::log_reconciler::{
    reconcile_log_history_with_added_block, reconcile_log_history_with_removed_block,
};
use crate::source::{ActiveFilters, BlockSource, LogSource};
use crate::types::Block;

/// Collaborators and settings shared by every step.
pub struct Reconciler<'a> {
    pub blocks: &'a dyn BlockSource,
    pub logs: &'a dyn LogSource,
    pub filters: &'a dyn ActiveFilters,
    pub retention: usize,
}

impl Reconciler<'_> {
    /// Reconcile `new_block` into `history`, returning the replacement pair.
    ///
    /// Events reach `sink` in dependency order: a block is announced before
    /// its logs, and its logs are retracted before the block.
    pub async fn reconcile(
        &self,
        history: BlockAndLogHistory,
        new_block: Block,
        sink: &mut dyn EventSink,
    ) -> Result<BlockAndLogHistory, ReconcileError> {
        let BlockAndLogHistory { blocks, logs } = history;
        let mut hooks = LogFollower {
            reconciler: self,
            logs: Some(logs),
            sink,
        };
        let blocks =
            reconcile_block_history(self.blocks, blocks, new_block, &mut hooks, self.retention)
                .await?;
        let logs = hooks.logs.take().unwrap_or_default();
        Ok(BlockAndLogHistory { blocks, logs })
    }
}

/// Shorthand for a one-off [`Reconciler::reconcile`].
pub async fn reconcile_blocks_and_logs(
    block_source: &dyn BlockSource,
    log_source: &dyn LogSource,
    history: BlockAndLogHistory,
    new_block: Block,
    filters: &dyn ActiveFilters,
    sink: &mut dyn EventSink,
    retention: usize,
) -> Result<BlockAndLogHistory, ReconcileError> {
    Reconciler {
        blocks: block_source,
        logs: log_source,
        filters,
        retention,
    }
    .reconcile(history, new_block, sink)
    .await
}

/// Keeps log history in step with the blocks the block reconciler moves.
struct LogFollower<'r, 's> {
    reconciler: &'r Reconciler<'r>,
    // Taken while a log step runs; a failed step leaves it empty, which is fine
    // because the whole reconciliation is then discarded.
    logs: Option<LogHistory>,
    sink: &'s mut dyn EventSink,
}

#[async_trait]
impl BlockEvents for LogFollower<'_, '_> {
    async fn block_added(&mut self, block: &Block) -> Result<(), ReconcileError> {
        self.sink.emit(ChainEvent::BlockAdded(block.clone()));
        let logs = self.logs.take().unwrap_or_default();
        let logs = reconcile_log_history_with_added_block(
            self.reconciler.logs,
            logs,
            block,
            self.reconciler.filters,
            &mut *self.sink,
            self.reconciler.retention,
        )
        .await?;
        self.logs = Some(logs);
        Ok(())
    }

    async fn block_removed(&mut self, block: &Block) -> Result<(), ReconcileError> {
        let logs = self.logs.take().unwrap_or_default();
        let logs = reconcile_log_history_with_removed_block(logs, block, &mut *self.sink)?;
        self.sink.emit(ChainEvent::BlockRemoved(block.clone()));
        self.logs = Some(logs);
        Ok(())
    }
}
