//! blockstream-core: reorg-aware reconciliation of recent blocks and their logs.
//!
//! # Architecture
//!
//! ```text
//! Reconciler (reconcile_blocks_and_logs)
//!     ├── block_reconciler  (append / reorg / backfill / rollback)
//!     ├── log_reconciler    (fetch per filter, order, prune, retract)
//!     ├── BlockSource / LogSource / ActiveFilters (collaborators)
//!     └── EventSink         (ordered ChainEvents)
//! ```
//!
//! Everything here is a pure step: the caller owns the histories and decides
//! whether to keep the result.

pub mod block_reconciler;
pub mod error;
pub mod event;
pub mod history;
pub mod log_reconciler;
pub mod quantity;
pub mod reconciler;
pub mod source;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use block_reconciler::reconcile_block_history;
pub use error::ReconcileError;
pub use event::{BlockEvents, ChainEvent, EmitBlocks, EventSink};
pub use history::{BlockAndLogHistory, BlockHistory, LogHistory};
pub use log_reconciler::{
    reconcile_log_history_with_added_block, reconcile_log_history_with_removed_block,
};
pub use reconciler::{reconcile_blocks_and_logs, Reconciler};
pub use source::{block_source_fn, log_source_fn, ActiveFilters, BlockSource, LogSource};
pub use types::{Block, Filter, FilterOptions, Log, TopicFilter, GENESIS_PARENT_HASH};
