//! Asynchronous content store for cached content blobs.
//!
//! A [`ContentStore`] keeps opaque byte payloads under string keys in a
//! persistent [`StorageEngine`](cstore_engine::StorageEngine). It is a cache:
//! callers treat any failure as a miss and refetch from the source.
//!
//! # Writes
//!
//! Writes are batched into a [`ContentMutation`], an ordered list of
//! [`ContentOperation`]s. The store applies them strictly one after another
//! and halts at the first failure without rolling back what was already
//! applied. Mutations are therefore not transactions.
//!
//! # Reads
//!
//! - [`ContentStore::load_content`] -- exact key set, missing keys omitted
//! - [`ContentStore::load_content_by_prefix`] -- byte-exact key prefix
//! - [`ContentStore::load_all_content_keys`] -- full key enumeration
//!
//! # Threading
//!
//! A store is single-threaded (`!Send`) and runs its engine calls as local
//! tasks, so it must be created and used inside a
//! [`tokio::task::LocalSet`].
//!
//! ```no_run
//! use cstore_core::{ContentMutation, ContentStore, StoreConfig};
//! use cstore_engine::MemoryEngine;
//!
//! # async fn demo() {
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let store = ContentStore::new(Box::new(MemoryEngine::new()), &StoreConfig::default());
//!         store.wait_for_init().await;
//!
//!         let mut mutation = ContentMutation::new();
//!         mutation.append_upsert("card/1", b"payload".to_vec());
//!         assert!(store.commit_content_mutation(mutation).await);
//!
//!         let loaded = store.load_content(["card/1"]).await;
//!         assert!(loaded.success);
//!     })
//!     .await;
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mutation;
pub mod operation;
pub mod record;
pub mod store;

pub use completion::{Completion, ContentEntry, KeysResult, LoadResult};
pub use config::StoreConfig;
pub use error::{ConfigError, MutationError, RecordError};
pub use metrics::{MetricEvent, MetricsSink, RecordingMetrics, TracingMetrics};
pub use mutation::ContentMutation;
pub use operation::ContentOperation;
pub use record::ContentRecord;
pub use store::{ContentStore, InitState};
