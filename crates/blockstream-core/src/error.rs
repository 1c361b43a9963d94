//! Error types for block and log reconciliation.

use thiserror::Error;

/// Errors that abort a reconciliation.
///
/// Any of these rejects the whole step: the caller keeps its previous history
/// and discards whatever events were emitted for the failed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Backfill needed an ancestor that the block source could not provide.
    #[error("Unknown parent block {hash}: failed to fetch parent block")]
    UnknownParentBlock { hash: String },

    /// A check that should be unreachable failed.
    #[error("Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    /// An incoming log would break the `(block_number, log_index)` order of log history.
    #[error(
        "Log ordering violation: {reason} (log {block_number}/{log_index}, head log {head_block_number}/{head_log_index})"
    )]
    LogOrderingViolation {
        block_number: u64,
        log_index: u64,
        head_block_number: u64,
        head_log_index: u64,
        reason: &'static str,
    },

    /// A block or log fetch failed.
    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ReconcileError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Returns `true` for programming-contract failures rather than bad input
    /// or a flaky source.
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
