//! Ordered key/value storage engines for the cstore content cache.
//!
//! The content store never touches files directly; it talks to a
//! [`StorageEngine`], an asynchronous ordered map with filtered bulk reads
//! and batched writes.
//!
//! # Engines
//!
//! - [`MemoryEngine`] -- `BTreeMap`-backed engine with fault injection, for
//!   tests and embedding
//! - [`LogEngine`] -- persistent engine: in-memory map plus a CRC-framed
//!   append-only log replayed on open
//!
//! Engines are normally obtained from an [`EngineProvider`] keyed by
//! [`DatabaseId`].
//!
//! # Filters
//!
//! Predicates are plain data ([`KeyFilter`]) rather than closures, so a read
//! or remove request can be inspected and persisted.

pub mod error;
pub mod filter;
pub mod log;
pub mod memory;
pub mod options;
pub mod provider;
pub mod traits;

pub use error::{EngineError, EngineResult};
pub use filter::{Entry, KeyFilter};
pub use log::LogEngine;
pub use memory::{InitGate, MemoryEngine};
pub use options::{
    EngineOptions, SyncMode, DEFAULT_WRITE_BUFFER_SIZE, LOW_RESOURCE_WRITE_BUFFER_SIZE,
};
pub use provider::{DatabaseId, EngineProvider, LogEngineProvider, MemoryEngineProvider};
pub use traits::StorageEngine;
