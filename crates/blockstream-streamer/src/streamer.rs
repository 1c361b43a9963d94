//! The checkpointed block and log streamer.
//!
//! # Flow
//! `reconcile_new_block` numbers the block and queues it for a single worker
//! task. The worker handles one block at a time:
//!   - Reconcile against a copy of the checkpoint, buffering events
//!   - On success, commit the copy, then deliver the buffered events in order
//!   - On failure, drop the copy and the events, and fail every block that
//!     was already queued behind it
//!
//! Callers can fire off blocks without awaiting them; ordering is still by
//! submission.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use blockstream_core::{
    Block, BlockAndLogHistory, BlockSource, Filter, Log, LogSource, Reconciler,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::builder::StreamerBuilder;
use crate::checkpoint::Checkpoint;
use crate::config::StreamerConfig;
use crate::error::StreamerError;
use crate::registry::{CallbackResult, ErrorSink, Registry};
use crate::token::Token;

type Reply = oneshot::Sender<Result<(), StreamerError>>;

struct Job {
    seq: u64,
    block: Block,
    reply: Reply,
}

/// State shared between the handle and its worker.
struct Shared {
    retention: usize,
    checkpoint: Checkpoint,
    registry: Registry,
    errors: ErrorSink,
    /// Next submission number. The worker holds this lock while replying to a
    /// failure, so every submission is cleanly before or after it.
    next_seq: Mutex<u64>,
}

impl Shared {
    fn lock_seq(&self) -> MutexGuard<'_, u64> {
        self.next_seq.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Follows a chain head by reconciling blocks into a bounded, reorg-aware
/// history and announcing what changed.
///
/// Dropping the streamer stops its worker; unresolved reconciliations then
/// resolve to [`StreamerError::WorkerStopped`].
pub struct BlockAndLogStreamer {
    shared: Arc<Shared>,
    jobs: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

impl BlockAndLogStreamer {
    pub fn builder() -> StreamerBuilder {
        StreamerBuilder::new()
    }

    pub(crate) fn spawn(
        block_source: Arc<dyn BlockSource>,
        log_source: Arc<dyn LogSource>,
        errors: ErrorSink,
        config: StreamerConfig,
    ) -> Result<Self, StreamerError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            StreamerError::Config(format!("streamer must be built inside a tokio runtime: {e}"))
        })?;

        let shared = Arc::new(Shared {
            retention: config.block_retention,
            checkpoint: Checkpoint::new(),
            registry: Registry::new(),
            errors,
            next_seq: Mutex::new(0),
        });
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = Worker {
            shared: shared.clone(),
            block_source,
            log_source,
            poison: None,
        };
        let worker = runtime.spawn(worker.run(queue));

        tracing::info!(block_retention = config.block_retention, "Block and log streamer started");
        Ok(Self {
            shared,
            jobs,
            worker,
        })
    }

    /// Queue `block` for reconciliation.
    ///
    /// The block is queued right away; awaiting the returned future only
    /// observes the outcome. It resolves once the result is committed and
    /// every subscriber has been notified, or once the reconciliation was
    /// rolled back.
    pub fn reconcile_new_block(&self, block: Block) -> PendingReconciliation {
        let (reply, outcome) = oneshot::channel();
        let mut next_seq = self.shared.lock_seq();
        let seq = *next_seq;
        *next_seq += 1;
        tracing::debug!(seq, number = block.number, hash = %block.hash, "Block queued");
        if self.jobs.send(Job { seq, block, reply }).is_err() {
            // The job, and with it the reply sender, was handed back and dropped.
            tracing::warn!(seq, "Streamer worker is gone; block not queued");
        }
        PendingReconciliation { outcome }
    }

    /// Head of the last committed history. Never reflects a reconciliation
    /// still in flight.
    pub fn latest_reconciled_block(&self) -> Option<Block> {
        self.shared.checkpoint.head()
    }

    /// A copy of the committed block and log history.
    pub fn checkpoint(&self) -> BlockAndLogHistory {
        self.shared.checkpoint.snapshot()
    }

    pub fn block_retention(&self) -> usize {
        self.shared.retention
    }

    // ─── Log filters ──────────────────────────────────────────────────────────

    /// Fetch logs matching `filter` for every block added from now on.
    pub fn add_log_filter(&self, filter: Filter) -> Token {
        let token = self.shared.registry.filters.insert(filter);
        tracing::debug!(%token, active = self.shared.registry.filters.len(), "Log filter added");
        token
    }

    pub fn remove_log_filter(&self, token: &Token) -> Result<(), StreamerError> {
        self.shared.registry.filters.remove(token)
    }

    // ─── Subscriptions ────────────────────────────────────────────────────────

    pub fn subscribe_to_block_added<F>(&self, callback: F) -> Token
    where
        F: Fn(&Block) -> CallbackResult + Send + Sync + 'static,
    {
        self.shared.registry.block_added.insert(Arc::new(callback))
    }

    pub fn unsubscribe_from_block_added(&self, token: &Token) -> Result<(), StreamerError> {
        self.shared.registry.block_added.remove(token)
    }

    pub fn subscribe_to_block_removed<F>(&self, callback: F) -> Token
    where
        F: Fn(&Block) -> CallbackResult + Send + Sync + 'static,
    {
        self.shared.registry.block_removed.insert(Arc::new(callback))
    }

    pub fn unsubscribe_from_block_removed(&self, token: &Token) -> Result<(), StreamerError> {
        self.shared.registry.block_removed.remove(token)
    }

    /// `callback(block_hash, logs)` runs after each block added, with the logs
    /// appended for it (possibly none).
    pub fn subscribe_to_logs_added<F>(&self, callback: F) -> Token
    where
        F: Fn(&str, &[Log]) -> CallbackResult + Send + Sync + 'static,
    {
        self.shared.registry.logs_added.insert(Arc::new(callback))
    }

    pub fn unsubscribe_from_logs_added(&self, token: &Token) -> Result<(), StreamerError> {
        self.shared.registry.logs_added.remove(token)
    }

    /// `callback(block_hash, logs)` runs before each block removed, with its
    /// logs most recent first.
    pub fn subscribe_to_logs_removed<F>(&self, callback: F) -> Token
    where
        F: Fn(&str, &[Log]) -> CallbackResult + Send + Sync + 'static,
    {
        self.shared.registry.logs_removed.insert(Arc::new(callback))
    }

    pub fn unsubscribe_from_logs_removed(&self, token: &Token) -> Result<(), StreamerError> {
        self.shared.registry.logs_removed.remove(token)
    }
}

impl Drop for BlockAndLogStreamer {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Outcome of a queued reconciliation. See
/// [`BlockAndLogStreamer::reconcile_new_block`].
#[derive(Debug)]
pub struct PendingReconciliation {
    outcome: oneshot::Receiver<Result<(), StreamerError>>,
}

impl Future for PendingReconciliation {
    type Output = Result<(), StreamerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|reply| reply.unwrap_or_else(|_| Err(StreamerError::WorkerStopped)))
    }
}

// ─── Worker ───────────────────────────────────────────────────────────────────

/// Failure that later-queued blocks inherit.
struct Poison {
    /// Jobs numbered below this were queued before the failure was reported.
    below: u64,
    cause: StreamerError,
}

struct Worker {
    shared: Arc<Shared>,
    block_source: Arc<dyn BlockSource>,
    log_source: Arc<dyn LogSource>,
    poison: Option<Poison>,
}

impl Worker {
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Job>) {
        while let Some(Job { seq, block, reply }) = queue.recv().await {
            let result = match self.inherited_failure(seq) {
                Some(cause) => Err(StreamerError::ChainedFailure {
                    block_hash: block.hash.clone(),
                    source: Box::new(cause),
                }),
                None => self.reconcile(seq, block.clone()).await,
            };
            if let Err(err) = &result {
                let fatal = matches!(err.root_cause(), StreamerError::Reconcile(e) if e.is_fatal_invariant());
                tracing::error!(
                    seq,
                    number = block.number,
                    hash = %block.hash,
                    error = %err,
                    fatal,
                    "Reconciliation rejected; checkpoint unchanged"
                );
            }
            self.settle(result, reply);
        }
        tracing::debug!("Streamer worker stopped");
    }

    fn inherited_failure(&self, seq: u64) -> Option<StreamerError> {
        self.poison
            .as_ref()
            .filter(|poison| seq < poison.below)
            .map(|poison| poison.cause.clone())
    }

    async fn reconcile(&self, seq: u64, block: Block) -> Result<(), StreamerError> {
        let reconciler = Reconciler {
            blocks: self.block_source.as_ref(),
            logs: self.log_source.as_ref(),
            filters: &self.shared.registry.filters,
            retention: self.shared.retention,
        };
        let mut events = VecDeque::new();
        let history = reconciler
            .reconcile(self.shared.checkpoint.snapshot(), block, &mut events)
            .await?;

        let head = history.blocks.head().map(|b| (b.number, b.hash.clone()));
        let (blocks, logs) = (history.blocks.len(), history.logs.len());
        self.shared.checkpoint.commit(history);
        if let Some((number, hash)) = head {
            tracing::info!(seq, head = number, %hash, blocks, logs, events = events.len(), "Checkpoint committed");
        }

        while let Some(event) = events.pop_front() {
            tracing::trace!(seq, block = event.block_hash(), "Delivering event");
            self.shared.registry.deliver(&event, &self.shared.errors);
        }
        Ok(())
    }

    fn settle(&mut self, result: Result<(), StreamerError>, reply: Reply) {
        match result {
            Ok(()) => {
                let _ = reply.send(Ok(()));
            }
            // Chained failures are already covered by the poison that caused them.
            Err(err) if err.is_chained() => {
                let _ = reply.send(Err(err));
            }
            Err(err) => {
                let next_seq = self.shared.lock_seq();
                self.poison = Some(Poison {
                    below: *next_seq,
                    cause: err.root_cause().clone(),
                });
                let _ = reply.send(Err(err));
            }
        }
    }
}
