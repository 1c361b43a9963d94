//! Shared mocks for the streamer integration tests.
//!
//! Mock hashes encode a 4-char fork tag and the block number, so the block
//! source can produce any ancestor on demand.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blockstream_core::{
    Block, BlockSource, Filter, FilterOptions, Log, LogSource, ReconcileError, GENESIS_PARENT_HASH,
};
use blockstream_streamer::{BlockAndLogStreamer, StreamerError, TokenKind};

pub fn mock_hash(number: u64, fork: &str) -> String {
    format!("0x{fork}{number:060x}")
}

pub fn mock_block(number: u64, fork: &str, parent_fork: &str) -> Block {
    let parent = match number.checked_sub(1) {
        Some(p) => mock_hash(p, parent_fork),
        None => GENESIS_PARENT_HASH.to_string(),
    };
    Block::new(number, mock_hash(number, fork), parent)
}

pub fn mock_log(number: u64, log_index: u64, fork: &str) -> Log {
    Log::new(number, mock_hash(number, fork), log_index)
}

fn decode(hash: &str) -> Option<(u64, String)> {
    let body = hash.strip_prefix("0x")?;
    let number = u64::from_str_radix(body.get(4..)?, 16).ok()?;
    Some((number, body.get(..4)?.to_string()))
}

/// Knows every mock block except the ones marked missing.
#[derive(Default)]
pub struct MockChain {
    missing: HashSet<String>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(mut self, hash: String) -> Self {
        self.missing.insert(hash);
        self
    }
}

#[async_trait]
impl BlockSource for MockChain {
    async fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, ReconcileError> {
        tokio::task::yield_now().await;
        if self.missing.contains(hash) {
            return Ok(None);
        }
        Ok(decode(hash).map(|(number, fork)| mock_block(number, &fork, &fork)))
    }
}

/// Returns `per_filter` logs for the requested block and counts calls.
#[derive(Clone)]
pub struct MockLogs {
    per_filter: u64,
    calls: Arc<AtomicUsize>,
    failing: Option<String>,
}

impl MockLogs {
    pub fn new(per_filter: u64) -> Self {
        Self {
            per_filter,
            calls: Arc::new(AtomicUsize::new(0)),
            failing: None,
        }
    }

    /// Fails every fetch for the block `hash`.
    pub fn failing_for(mut self, hash: String) -> Self {
        self.failing = Some(hash);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSource for MockLogs {
    async fn logs(&self, options: &FilterOptions) -> Result<Vec<Log>, ReconcileError> {
        tokio::task::yield_now().await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.as_deref() == Some(options.block_hash.as_str()) {
            return Err(ReconcileError::Rpc(format!("no logs for {}", options.block_hash)));
        }
        let number = decode(&options.block_hash).map_or(0, |(n, _)| n);
        Ok((0..self.per_filter)
            .map(|i| Log::new(number, options.block_hash.clone(), i))
            .collect())
    }
}

/// Everything subscribers and the error sink saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    BlockAdded(Block),
    BlockRemoved(Block),
    LogAdded(Log),
    LogRemoved(Log),
    Error(TokenKind, String),
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Seen>>>);

impl Recorder {
    pub fn push(&self, seen: Seen) {
        self.0.lock().unwrap().push(seen);
    }

    pub fn take(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// A streamer with one catch-all filter and every subscription recording.
pub fn recording_streamer(
    blocks: MockChain,
    logs: MockLogs,
    retention: usize,
) -> (BlockAndLogStreamer, Recorder) {
    let recorder = Recorder::default();
    let sink = recorder.clone();
    let streamer = BlockAndLogStreamer::builder()
        .block_source(blocks)
        .log_source(logs)
        .error_sink(move |err| match err {
            StreamerError::SubscriberCallback { kind, reason } => sink.push(Seen::Error(kind, reason)),
            other => panic!("unexpected error sent to sink: {other}"),
        })
        .block_retention(retention)
        .build()
        .unwrap();

    streamer.add_log_filter(Filter::default());
    let r = recorder.clone();
    streamer.subscribe_to_block_added(move |b| {
        r.push(Seen::BlockAdded(b.clone()));
        Ok(())
    });
    let r = recorder.clone();
    streamer.subscribe_to_block_removed(move |b| {
        r.push(Seen::BlockRemoved(b.clone()));
        Ok(())
    });
    let r = recorder.clone();
    streamer.subscribe_to_logs_added(move |_, logs| {
        logs.iter().for_each(|l| r.push(Seen::LogAdded(l.clone())));
        Ok(())
    });
    let r = recorder.clone();
    streamer.subscribe_to_logs_removed(move |_, logs| {
        logs.iter().for_each(|l| r.push(Seen::LogRemoved(l.clone())));
        Ok(())
    });
    (streamer, recorder)
}
