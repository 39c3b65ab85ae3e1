//! The [`StorageEngine`] trait: the ordered key/value port the content store
//! is built on.

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::filter::{Entry, KeyFilter};
use crate::options::EngineOptions;

/// Asynchronous ordered key/value storage.
///
/// Futures returned by an engine are polled by the task that issued the
/// call, so results always arrive on the caller's sequence. Engines may move
/// blocking I/O onto a worker pool internally.
///
/// Implementations must satisfy:
/// - A key maps to at most one value; writes are last-write-wins.
/// - `init` completes exactly once; calls issued before it succeeds fail
///   with [`EngineError::NotInitialized`](crate::EngineError::NotInitialized).
/// - A single `update_entries*` call either applies fully or reports failure.
#[async_trait(?Send)]
pub trait StorageEngine {
    /// Open or create the backing store.
    async fn init(&self, options: EngineOptions) -> EngineResult<()>;

    /// Load every entry whose key starts with `target_prefix` and satisfies
    /// `filter`. An empty `target_prefix` scans the whole keyspace.
    async fn load_entries_with_filter(
        &self,
        filter: &KeyFilter,
        target_prefix: &str,
    ) -> EngineResult<Vec<Entry>>;

    /// Load every stored key.
    async fn load_keys(&self) -> EngineResult<Vec<String>>;

    /// Apply upserts and exact-key deletes as one write.
    async fn update_entries(&self, upserts: Vec<Entry>, deletes: Vec<String>) -> EngineResult<()>;

    /// Apply upserts and delete every stored key matching `remove_filter`.
    ///
    /// Deletes are resolved against the keys stored before the upserts are
    /// applied, so an upserted key is never removed by the same call.
    async fn update_entries_with_remove_filter(
        &self,
        upserts: Vec<Entry>,
        remove_filter: &KeyFilter,
    ) -> EngineResult<()>;
}
