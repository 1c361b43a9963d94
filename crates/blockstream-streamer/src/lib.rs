//! blockstream-streamer: checkpointed block and log streaming with
//! subscriber fan-out.
//!
//! Feed it every new head you see; it keeps a bounded, reorg-aware history
//! of recent blocks and the logs matching your filters, and tells
//! subscribers exactly what was added and removed, in order.

pub mod builder;
mod checkpoint;
pub mod config;
pub mod error;
mod registry;
pub mod streamer;
pub mod token;

pub use builder::StreamerBuilder;
pub use config::StreamerConfig;
pub use error::{BoxError, StreamerError};
pub use registry::{CallbackResult, ErrorSink};
pub use streamer::{BlockAndLogStreamer, PendingReconciliation};
pub use token::{Token, TokenKind};
