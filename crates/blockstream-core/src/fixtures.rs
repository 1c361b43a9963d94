//! Mock chain used by the unit tests.
//!
//! A mock hash encodes its fork tag and block number (`0x` + 4-char fork +
//! 60 hex digits of number), so a block source can fabricate any ancestor.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::history::BlockHistory;
use crate::source::{BlockSource, LogSource};
use crate::types::{Block, FilterOptions, Log, GENESIS_PARENT_HASH};

pub(crate) fn mock_hash(number: u64, fork: &str) -> String {
    format!("0x{fork}{number:060x}")
}

pub(crate) fn mock_block(number: u64, fork: &str, parent_fork: &str) -> Block {
    let parent = match number.checked_sub(1) {
        Some(p) => mock_hash(p, parent_fork),
        None => GENESIS_PARENT_HASH.to_string(),
    };
    Block::new(number, mock_hash(number, fork), parent)
}

pub(crate) fn mock_history(numbers: RangeInclusive<u64>, fork: &str) -> BlockHistory {
    numbers.map(|n| mock_block(n, fork, fork)).collect()
}

pub(crate) fn mock_log(block_number: u64, log_index: u64, fork: &str) -> Log {
    Log::new(block_number, mock_hash(block_number, fork), log_index)
}

fn decode_mock_hash(hash: &str) -> Option<(u64, String)> {
    let body = hash.strip_prefix("0x")?;
    let fork = body.get(..4)?;
    let number = u64::from_str_radix(body.get(4..)?, 16).ok()?;
    Some((number, fork.to_string()))
}

enum Fallback {
    Derive,
    Missing,
    Fail(String),
}

pub(crate) struct MockBlockSource {
    blocks: HashMap<String, Block>,
    fallback: Fallback,
}

impl MockBlockSource {
    /// Knows every mock hash; unknown forks get a same-fork parent.
    pub(crate) fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            fallback: Fallback::Derive,
        }
    }

    pub(crate) fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (b.hash.clone(), b)).collect(),
            fallback: Fallback::Derive,
        }
    }

    /// Knows nothing.
    pub(crate) fn empty() -> Self {
        Self {
            blocks: HashMap::new(),
            fallback: Fallback::Missing,
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            blocks: HashMap::new(),
            fallback: Fallback::Fail(reason.to_string()),
        }
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, ReconcileError> {
        tokio::task::yield_now().await;
        if let Some(block) = self.blocks.get(hash) {
            return Ok(Some(block.clone()));
        }
        match &self.fallback {
            Fallback::Derive => {
                Ok(decode_mock_hash(hash).map(|(number, fork)| mock_block(number, &fork, &fork)))
            }
            Fallback::Missing => Ok(None),
            Fallback::Fail(reason) => Err(ReconcileError::Rpc(reason.clone())),
        }
    }
}

/// Returns `logs_per_filter` logs (indices 0..n) for whichever block is asked for.
pub(crate) struct MockLogSource {
    pub(crate) logs_per_filter: u64,
    pub(crate) calls: std::sync::Mutex<Vec<FilterOptions>>,
}

impl MockLogSource {
    pub(crate) fn new(logs_per_filter: u64) -> Self {
        Self {
            logs_per_filter,
            calls: std::sync::Mutex::new(vec![]),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn logs(&self, options: &FilterOptions) -> Result<Vec<Log>, ReconcileError> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(options.clone());
        let number = decode_mock_hash(&options.block_hash).map_or(0, |(n, _)| n);
        Ok((0..self.logs_per_filter)
            .map(|i| Log::new(number, options.block_hash.clone(), i))
            .collect())
    }
}
