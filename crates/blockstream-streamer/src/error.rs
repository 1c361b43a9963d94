//! Error types for the streamer.

use blockstream_core::ReconcileError;
use thiserror::Error;

use crate::token::TokenKind;

/// Boxed error a subscriber callback may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`BlockAndLogStreamer`](crate::BlockAndLogStreamer).
#[derive(Debug, Clone, Error)]
pub enum StreamerError {
    /// The reconciliation itself failed; the checkpoint is untouched.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Submitted while an earlier reconciliation was still unresolved, and that
    /// one failed.
    #[error("Reconciliation of block {block_hash} was chained onto a failed reconciliation: {source}")]
    ChainedFailure {
        block_hash: String,
        #[source]
        source: Box<StreamerError>,
    },

    /// A subscriber returned an error or panicked. Only ever sent to the error sink.
    #[error("Subscriber error in '{kind}' callback: {reason}")]
    SubscriberCallback { kind: TokenKind, reason: String },

    /// Unsubscribe or filter removal with a token of the wrong kind, or one
    /// that is not registered.
    #[error("Expected a registered {expected} token. Actual: {actual}")]
    InvalidToken { expected: TokenKind, actual: String },

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The worker task is gone (streamer dropped or runtime shut down).
    #[error("Streamer worker stopped")]
    WorkerStopped,
}

impl StreamerError {
    /// The failure a chain of [`StreamerError::ChainedFailure`]s started from.
    pub fn root_cause(&self) -> &StreamerError {
        let mut err = self;
        while let Self::ChainedFailure { source, .. } = err {
            err = source.as_ref();
        }
        err
    }

    /// Returns `true` if this call failed only because an earlier one did.
    pub fn is_chained(&self) -> bool {
        matches!(self, Self::ChainedFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_chained_failures() {
        let root = StreamerError::Reconcile(ReconcileError::UnknownParentBlock {
            hash: "0xdead".into(),
        });
        let chained = StreamerError::ChainedFailure {
            block_hash: "0xb".into(),
            source: Box::new(StreamerError::ChainedFailure {
                block_hash: "0xa".into(),
                source: Box::new(root.clone()),
            }),
        };
        assert!(chained.is_chained());
        assert!(matches!(
            chained.root_cause(),
            StreamerError::Reconcile(ReconcileError::UnknownParentBlock { .. })
        ));
        assert!(chained.to_string().contains("0xdead"));
    }

    #[test]
    fn invalid_token_names_expected_kind() {
        let err = StreamerError::InvalidToken {
            expected: TokenKind::BlockAdded,
            actual: "on block removed token x".into(),
        };
        assert!(err.to_string().contains("on block added"));
    }
}
