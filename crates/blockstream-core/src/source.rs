//! Collaborators the reconcilers fetch from.
//!
//! Implement [`BlockSource`] and [`LogSource`] over a JSON-RPC provider, or wrap
//! async closures with [`block_source_fn`] / [`log_source_fn`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::types::{Block, Filter, FilterOptions, Log};

/// Fetches blocks by hash (`eth_getBlockByHash`).
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Returns `Ok(None)` if the provider does not know the block.
    async fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, ReconcileError>;
}

/// Fetches the logs of one block matching a filter (`eth_getLogs` with `blockHash`).
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn logs(&self, options: &FilterOptions) -> Result<Vec<Log>, ReconcileError>;
}

/// The set of filters to fetch logs for. Read once per added block.
pub trait ActiveFilters: Send + Sync {
    fn active_filters(&self) -> Vec<Filter>;
}

impl ActiveFilters for [Filter] {
    fn active_filters(&self) -> Vec<Filter> {
        self.to_vec()
    }
}

impl ActiveFilters for Vec<Filter> {
    fn active_filters(&self) -> Vec<Filter> {
        self.clone()
    }
}

#[async_trait]
impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    async fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, ReconcileError> {
        (**self).block_by_hash(hash).await
    }
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn logs(&self, options: &FilterOptions) -> Result<Vec<Log>, ReconcileError> {
        (**self).logs(options).await
    }
}

// ─── Closure adapters ─────────────────────────────────────────────────────────

/// A [`BlockSource`] backed by an async closure.
pub struct FnBlockSource<F>(F);

/// Wrap `f(hash)` as a [`BlockSource`].
pub fn block_source_fn<F, Fut>(f: F) -> FnBlockSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Block>, ReconcileError>> + Send,
{
    FnBlockSource(f)
}

#[async_trait]
impl<F, Fut> BlockSource for FnBlockSource<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Block>, ReconcileError>> + Send,
{
    async fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, ReconcileError> {
        (self.0)(hash.to_string()).await
    }
}

/// A [`LogSource`] backed by an async closure.
pub struct FnLogSource<F>(F);

/// Wrap `f(options)` as a [`LogSource`].
pub fn log_source_fn<F, Fut>(f: F) -> FnLogSource<F>
where
    F: Fn(FilterOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Log>, ReconcileError>> + Send,
{
    FnLogSource(f)
}

#[async_trait]
impl<F, Fut> LogSource for FnLogSource<F>
where
    F: Fn(FilterOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Log>, ReconcileError>> + Send,
{
    async fn logs(&self, options: &FilterOptions) -> Result<Vec<Log>, ReconcileError> {
        (self.0)(options.clone()).await
    }
}
