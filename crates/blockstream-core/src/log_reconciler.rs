//! Log history reconciliation, driven by block additions and removals.

use std::collections::HashSet;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::ReconcileError;
use crate::event::{ChainEvent, EventSink};
use crate::history::LogHistory;
use crate::source::{ActiveFilters, LogSource};
use crate::types::{Block, Log};

/// Fetch and append the logs of a newly added block.
///
/// One fetch is issued per active filter; results are merged, deduplicated by
/// `(block_hash, log_index)` and appended in index order. Logs that fall
/// `retention` or more blocks behind `block` are pruned afterwards. Emits a
/// single [`ChainEvent::LogsAdded`], even when nothing matched.
pub async fn reconcile_log_history_with_added_block(
    source: &dyn LogSource,
    mut history: LogHistory,
    block: &Block,
    filters: &dyn ActiveFilters,
    sink: &mut dyn EventSink,
    retention: usize,
) -> Result<LogHistory, ReconcileError> {
    let logs = fetch_block_logs(source, block, filters).await?;

    let mut added = Vec::with_capacity(logs.len());
    for log in logs {
        ensure_order(history.tail(), &log)?;
        history.push_tail(log.clone());
        added.push(log);
    }
    history.prune_older_than(block.number, retention);

    debug!(number = block.number, hash = %block.hash, logs = added.len(), "Logs added");
    sink.emit(ChainEvent::LogsAdded {
        block_hash: block.hash.clone(),
        logs: added,
    });
    Ok(history)
}

/// Retract the logs of a removed block from the tail of log history.
///
/// Emits a single [`ChainEvent::LogsRemoved`] (most recent first) before
/// checking that no log of the block remains further back. If one does, the
/// removal already emitted stands and the call fails.
pub fn reconcile_log_history_with_removed_block(
    mut history: LogHistory,
    block: &Block,
    sink: &mut dyn EventSink,
) -> Result<LogHistory, ReconcileError> {
    let mut removed = vec![];
    while history.tail().is_some_and(|l| l.block_hash == block.hash) {
        if let Some(log) = history.pop_tail() {
            removed.push(log);
        }
    }

    debug!(number = block.number, hash = %block.hash, logs = removed.len(), "Logs removed");
    sink.emit(ChainEvent::LogsRemoved {
        block_hash: block.hash.clone(),
        logs: removed,
    });

    if history.contains_block(&block.hash) {
        return Err(ReconcileError::invariant(format!(
            "logs for removed block {} found not at head of log history",
            block.hash
        )));
    }
    Ok(history)
}

async fn fetch_block_logs(
    source: &dyn LogSource,
    block: &Block,
    filters: &dyn ActiveFilters,
) -> Result<Vec<Log>, ReconcileError> {
    let options: Vec<_> = filters
        .active_filters()
        .iter()
        .map(|f| f.for_block(block.hash.clone()))
        .collect();
    let batches = try_join_all(options.iter().map(|o| source.logs(o))).await?;

    let mut seen = HashSet::new();
    let mut logs: Vec<Log> = batches
        .into_iter()
        .flatten()
        .filter(|log| {
            let (block_hash, log_index) = log.identity();
            seen.insert((block_hash.to_owned(), log_index))
        })
        .collect();
    logs.sort_by_key(|log| log.log_index);
    Ok(logs)
}

fn ensure_order(head: Option<&Log>, log: &Log) -> Result<(), ReconcileError> {
    let Some(head) = head else { return Ok(()) };
    let violation = |reason| ReconcileError::LogOrderingViolation {
        block_number: log.block_number,
        log_index: log.log_index,
        head_block_number: head.block_number,
        head_log_index: head.log_index,
        reason,
    };
    if log.block_number < head.block_number {
        return Err(violation("log for older block than current head log"));
    }
    if log.block_number == head.block_number && log.log_index <= head.log_index {
        return Err(violation("non-increasing index within same block"));
    }
    Ok(())
}
