//! Fluent builder API for creating streamers.
//!
//! # Example
//!
//! ```rust,no_run
//! use blockstream_core::{block_source_fn, log_source_fn, Block, FilterOptions, ReconcileError};
//! use blockstream_streamer::BlockAndLogStreamer;
//!
//! # async fn run() -> Result<(), blockstream_streamer::StreamerError> {
//! let streamer = BlockAndLogStreamer::builder()
//!     .block_source(block_source_fn(|_hash: String| async move {
//!         Ok::<Option<Block>, ReconcileError>(None)
//!     }))
//!     .log_source(log_source_fn(|_options: FilterOptions| async move {
//!         Ok::<_, ReconcileError>(vec![])
//!     }))
//!     .error_sink(|err| eprintln!("subscriber failed: {err}"))
//!     .block_retention(64)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use blockstream_core::{BlockSource, LogSource};

use crate::config::StreamerConfig;
use crate::error::StreamerError;
use crate::registry::ErrorSink;
use crate::streamer::BlockAndLogStreamer;

/// Fluent builder for [`BlockAndLogStreamer`].
///
/// A block source, a log source and an error sink are required.
#[derive(Default)]
pub struct StreamerBuilder {
    config: StreamerConfig,
    block_source: Option<Arc<dyn BlockSource>>,
    log_source: Option<Arc<dyn LogSource>>,
    error_sink: Option<ErrorSink>,
}

impl StreamerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set where blocks are fetched by hash (`eth_getBlockByHash`).
    pub fn block_source(mut self, source: impl BlockSource + 'static) -> Self {
        self.block_source = Some(Arc::new(source));
        self
    }

    /// Set where logs are fetched per filter and block (`eth_getLogs`).
    pub fn log_source(mut self, source: impl LogSource + 'static) -> Self {
        self.log_source = Some(Arc::new(source));
        self
    }

    /// Set the receiver for subscriber failures.
    pub fn error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(StreamerError) + Send + Sync + 'static,
    {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Set how many recent blocks are retained.
    pub fn block_retention(mut self, blocks: usize) -> Self {
        self.config.block_retention = blocks;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: StreamerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the streamer and spawn its worker on the current tokio runtime.
    pub fn build(self) -> Result<BlockAndLogStreamer, StreamerError> {
        let missing = |what: &str| StreamerError::Config(format!("{what} is required"));
        let block_source = self.block_source.ok_or_else(|| missing("a block source"))?;
        let log_source = self.log_source.ok_or_else(|| missing("a log source"))?;
        let error_sink = self.error_sink.ok_or_else(|| missing("an error sink"))?;
        BlockAndLogStreamer::spawn(block_source, log_source, error_sink, self.config)
    }
}
