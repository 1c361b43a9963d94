//! Block history reconciliation.
//!
//! Given the current history and a newly observed block, works out which
//! blocks must be retracted and which announced. The cases, first match wins:
//!
//! 1. **Empty history**: the block becomes the sole head.
//! 2. **Older than the oldest retained block**: full rollback, then the block
//!    becomes the sole head.
//! 3. **Already known**: nothing happens.
//! 4. **Child of the head**: appended.
//! 5. **Child of an older retained block** (reorg): heads are removed until the
//!    parent is the head, then the block is appended.
//! 6. **Unknown parent** (backfill): the parent is fetched and reconciled first.
//!    A genesis parent, or a parent more than `retention` blocks behind the
//!    head, ends backfill with a full rollback instead.

use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::event::BlockEvents;
use crate::history::BlockHistory;
use crate::source::BlockSource;
use crate::types::Block;

/// How a block relates to the history it is being reconciled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    FirstBlock,
    PredatesHistory,
    AlreadyKnown,
    NewHead,
    /// Parent retained, `depth` blocks below the head.
    Reorg { depth: usize },
    UnknownParent,
}

fn place(history: &BlockHistory, block: &Block) -> Placement {
    let (Some(head), Some(oldest)) = (history.head(), history.oldest()) else {
        return Placement::FirstBlock;
    };
    if block.number < oldest.number {
        return Placement::PredatesHistory;
    }
    if history.contains(&block.hash) {
        return Placement::AlreadyKnown;
    }
    if block.parent_hash == head.hash {
        return Placement::NewHead;
    }
    match history.iter().rev().position(|b| b.hash == block.parent_hash) {
        Some(depth) => Placement::Reorg { depth },
        None => Placement::UnknownParent,
    }
}

/// Reconcile `new_block` into `history`, returning the replacement history.
///
/// `events` hears about every block removed and added, in order. On error the
/// returned history is lost; callers keep their own copy of the previous one.
pub async fn reconcile_block_history(
    source: &dyn BlockSource,
    mut history: BlockHistory,
    new_block: Block,
    events: &mut dyn BlockEvents,
    retention: usize,
) -> Result<BlockHistory, ReconcileError> {
    // Blocks still waiting to be attached; each one is the child of the one below it.
    let mut pending = vec![new_block];

    while let Some(block) = pending.last() {
        match place(&history, block) {
            Placement::FirstBlock | Placement::NewHead => {}
            Placement::AlreadyKnown => {
                debug!(number = block.number, hash = %block.hash, "Block already in history");
                pending.pop();
                continue;
            }
            Placement::PredatesHistory => {
                warn!(
                    number = block.number,
                    oldest = history.oldest().map(|b| b.number),
                    "Block predates retained history, rolling back"
                );
                rollback(&mut history, events).await?;
            }
            Placement::Reorg { depth } => {
                warn!(depth, at = block.number, hash = %block.hash, "Reorg detected");
                while history.head().is_some_and(|h| h.hash != block.parent_hash) {
                    remove_head(&mut history, events).await?;
                }
            }
            Placement::UnknownParent => {
                if block.has_genesis_parent() {
                    warn!(number = block.number, "Parent is genesis, nothing to backfill");
                    rollback(&mut history, events).await?;
                } else {
                    let parent = source.block_by_hash(&block.parent_hash).await?.ok_or_else(|| {
                        ReconcileError::UnknownParentBlock {
                            hash: block.parent_hash.clone(),
                        }
                    })?;
                    // Every pushed parent must be strictly lower, or backfill never ends.
                    if parent.hash != block.parent_hash || parent.number >= block.number {
                        warn!(
                            requested = %block.parent_hash,
                            got = %parent.hash,
                            number = parent.number,
                            child = block.number,
                            "Block source returned the wrong parent"
                        );
                        return Err(ReconcileError::UnknownParentBlock {
                            hash: block.parent_hash.clone(),
                        });
                    }
                    let head_number = history.head().map_or(0, |h| h.number);
                    if (parent.number as u128) + (retention as u128) < head_number as u128 {
                        warn!(
                            parent = parent.number,
                            head = head_number,
                            retention,
                            "Fork deeper than retention window, rolling back"
                        );
                        rollback(&mut history, events).await?;
                    } else {
                        debug!(number = parent.number, hash = %parent.hash, "Backfilling parent block");
                        pending.push(parent);
                        continue;
                    }
                }
            }
        }

        let Some(block) = pending.pop() else { break };
        add_head(&mut history, block, events, retention).await?;
    }

    Ok(history)
}

async fn add_head(
    history: &mut BlockHistory,
    block: Block,
    events: &mut dyn BlockEvents,
    retention: usize,
) -> Result<(), ReconcileError> {
    if let Some(head) = history.head() {
        if head.hash != block.parent_hash {
            return Err(ReconcileError::invariant(format!(
                "new head block {}'s parent {} isn't the current head {}",
                block.hash, block.parent_hash, head.hash
            )));
        }
    }
    debug!(number = block.number, hash = %block.hash, "Adding block");
    events.block_added(&block).await?;
    history.push_head(block, retention);
    Ok(())
}

async fn remove_head(
    history: &mut BlockHistory,
    events: &mut dyn BlockEvents,
) -> Result<(), ReconcileError> {
    if let Some(removed) = history.pop_head() {
        debug!(number = removed.number, hash = %removed.hash, "Removing block");
        events.block_removed(&removed).await?;
    }
    Ok(())
}

/// Remove every block, head first.
async fn rollback(
    history: &mut BlockHistory,
    events: &mut dyn BlockEvents,
) -> Result<(), ReconcileError> {
    while !history.is_empty() {
        remove_head(history, events).await?;
    }
    Ok(())
}
