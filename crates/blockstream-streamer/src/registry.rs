//! Log filters and subscriber callbacks, keyed by [`Token`].
//!
//! Registrations are kept in insertion order, which is also delivery order.
//! Delivery works on a snapshot taken when the event is dispatched, so a
//! callback may subscribe or unsubscribe without deadlocking.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use blockstream_core::{ActiveFilters, Block, ChainEvent, Filter, Log};

use crate::error::{BoxError, StreamerError};
use crate::token::{Token, TokenKind};

/// What a subscriber callback returns.
pub type CallbackResult = Result<(), BoxError>;

pub(crate) type BlockCallback = Arc<dyn Fn(&Block) -> CallbackResult + Send + Sync>;
pub(crate) type LogsCallback = Arc<dyn Fn(&str, &[Log]) -> CallbackResult + Send + Sync>;

/// Receives errors that have no caller to return to.
pub type ErrorSink = Arc<dyn Fn(StreamerError) + Send + Sync>;

/// Registrations of one kind.
pub(crate) struct Registrations<T> {
    kind: TokenKind,
    entries: Mutex<Vec<(Token, T)>>,
}

impl<T: Clone> Registrations<T> {
    pub(crate) fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Token, T)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, value: T) -> Token {
        let token = Token::new(self.kind);
        self.lock().push((token, value));
        token
    }

    pub(crate) fn remove(&self, token: &Token) -> Result<(), StreamerError> {
        let invalid = || StreamerError::InvalidToken {
            expected: self.kind,
            actual: token.to_string(),
        };
        if token.kind() != self.kind {
            return Err(invalid());
        }
        let mut entries = self.lock();
        let pos = entries.iter().position(|(t, _)| t == token).ok_or_else(invalid)?;
        entries.remove(pos);
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Vec<T> {
        self.lock().iter().map(|(_, v)| v.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

impl ActiveFilters for Registrations<Filter> {
    fn active_filters(&self) -> Vec<Filter> {
        self.snapshot()
    }
}

/// Everything callers register with a streamer.
pub(crate) struct Registry {
    pub(crate) filters: Registrations<Filter>,
    pub(crate) block_added: Registrations<BlockCallback>,
    pub(crate) block_removed: Registrations<BlockCallback>,
    pub(crate) logs_added: Registrations<LogsCallback>,
    pub(crate) logs_removed: Registrations<LogsCallback>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            filters: Registrations::new(TokenKind::LogFilter),
            block_added: Registrations::new(TokenKind::BlockAdded),
            block_removed: Registrations::new(TokenKind::BlockRemoved),
            logs_added: Registrations::new(TokenKind::LogsAdded),
            logs_removed: Registrations::new(TokenKind::LogsRemoved),
        }
    }

    /// Deliver one event to every current subscriber of its kind.
    ///
    /// Subscriber failures never stop delivery; they go to `errors`.
    pub(crate) fn deliver(&self, event: &ChainEvent, errors: &ErrorSink) {
        match event {
            ChainEvent::BlockAdded(block) => {
                for callback in self.block_added.snapshot() {
                    guarded(TokenKind::BlockAdded, errors, || callback(block));
                }
            }
            ChainEvent::BlockRemoved(block) => {
                for callback in self.block_removed.snapshot() {
                    guarded(TokenKind::BlockRemoved, errors, || callback(block));
                }
            }
            ChainEvent::LogsAdded { block_hash, logs } => {
                for callback in self.logs_added.snapshot() {
                    guarded(TokenKind::LogsAdded, errors, || callback(block_hash, logs));
                }
            }
            ChainEvent::LogsRemoved { block_hash, logs } => {
                for callback in self.logs_removed.snapshot() {
                    guarded(TokenKind::LogsRemoved, errors, || callback(block_hash, logs));
                }
            }
        }
    }
}

fn guarded(kind: TokenKind, errors: &ErrorSink, callback: impl FnOnce() -> CallbackResult) {
    let reason = match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    tracing::warn!(%kind, %reason, "Subscriber callback failed");
    let err = StreamerError::SubscriberCallback { kind, reason };
    if panic::catch_unwind(AssertUnwindSafe(|| errors(err))).is_err() {
        tracing::error!(%kind, "Error sink panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
