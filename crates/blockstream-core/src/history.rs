//! Bounded block and log histories.
//!
//! Both are plain `VecDeque`s, oldest first. Reconcilers work on an owned copy
//! and hand back a replacement; nothing mutates a committed history in place.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{Block, Log};

// ─── BlockHistory ─────────────────────────────────────────────────────────────

/// Recent blocks, oldest first, newest (the head) last.
///
/// Every block is the child of the one before it and no hash appears twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHistory {
    blocks: VecDeque<Block>,
}

impl BlockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently added block.
    pub fn head(&self) -> Option<&Block> {
        self.blocks.back()
    }

    /// The oldest retained block.
    pub fn oldest(&self) -> Option<&Block> {
        self.blocks.front()
    }

    /// Returns `true` if a block with this hash is retained.
    pub fn contains(&self, hash: &str) -> bool {
        self.blocks.iter().any(|b| b.hash == hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks from oldest to head.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Block> + ExactSizeIterator {
        self.blocks.iter()
    }

    /// Append a new head, then evict the oldest blocks beyond `retention`.
    ///
    /// Evicted blocks simply age out; callers do not announce them.
    pub(crate) fn push_head(&mut self, block: Block, retention: usize) {
        self.blocks.push_back(block);
        while self.blocks.len() > retention {
            self.blocks.pop_front();
        }
    }

    pub(crate) fn pop_head(&mut self) -> Option<Block> {
        self.blocks.pop_back()
    }

    /// Check the parent-hash chain and hash uniqueness.
    ///
    /// Returns the index of the first offending block.
    pub fn verify_chain(&self) -> Result<(), usize> {
        let mut seen = HashSet::with_capacity(self.blocks.len());
        for (i, block) in self.blocks.iter().enumerate() {
            if !seen.insert(block.hash.as_str()) {
                return Err(i);
            }
            if i > 0 && !block.extends(&self.blocks[i - 1]) {
                return Err(i);
            }
        }
        Ok(())
    }
}

impl FromIterator<Block> for BlockHistory {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

// ─── LogHistory ───────────────────────────────────────────────────────────────

/// Logs of recent blocks, ordered by `(block_number, log_index)`.
///
/// Logs of one block are contiguous. Bounded by block age rather than count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHistory {
    logs: VecDeque<Log>,
}

impl LogHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently appended log.
    pub fn tail(&self) -> Option<&Log> {
        self.logs.back()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Log> + ExactSizeIterator {
        self.logs.iter()
    }

    /// Returns `true` if any retained log belongs to `block_hash`.
    pub fn contains_block(&self, block_hash: &str) -> bool {
        self.logs.iter().any(|l| l.block_hash == block_hash)
    }

    pub(crate) fn push_tail(&mut self, log: Log) {
        self.logs.push_back(log);
    }

    pub(crate) fn pop_tail(&mut self) -> Option<Log> {
        self.logs.pop_back()
    }

    /// Drop leading logs whose block is `retention` or more blocks older than `newest`.
    pub(crate) fn prune_older_than(&mut self, newest: u64, retention: usize) {
        let retention = u64::try_from(retention).unwrap_or(u64::MAX);
        while let Some(front) = self.logs.front() {
            if newest.saturating_sub(front.block_number) >= retention {
                self.logs.pop_front();
            } else {
                break;
            }
        }
    }
}

impl FromIterator<Log> for LogHistory {
    fn from_iter<I: IntoIterator<Item = Log>>(iter: I) -> Self {
        Self {
            logs: iter.into_iter().collect(),
        }
    }
}

// ─── BlockAndLogHistory ───────────────────────────────────────────────────────

/// A block history together with the log history derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAndLogHistory {
    pub blocks: BlockHistory,
    pub logs: LogHistory,
}

impl BlockAndLogHistory {
    pub fn new() -> Self {
        Self::default()
    }
}
