use std::fmt;
use std::path::Path;

use crate::log::LogEngine;
use crate::memory::MemoryEngine;
use crate::traits::StorageEngine;

/// Identifies which logical database an engine backs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatabaseId {
    /// Cached content blobs.
    FeedContent,
}

impl DatabaseId {
    /// Sub-folder of the data directory holding this database.
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::FeedContent => "content",
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Hands out uninitialized engines for a database.
///
/// Resolved once when a content store is built; the store owns the engine
/// it receives.
pub trait EngineProvider {
    fn engine(&self, id: DatabaseId, data_dir: &Path) -> Box<dyn StorageEngine>;
}

/// Provides [`LogEngine`]s under `<data_dir>/<database folder>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEngineProvider;

impl EngineProvider for LogEngineProvider {
    fn engine(&self, id: DatabaseId, data_dir: &Path) -> Box<dyn StorageEngine> {
        Box::new(LogEngine::new(data_dir.join(id.folder_name())))
    }
}

/// Provides clones of a shared [`MemoryEngine`], ignoring the path.
#[derive(Clone, Debug, Default)]
pub struct MemoryEngineProvider {
    engine: MemoryEngine,
}

impl MemoryEngineProvider {
    pub fn new(engine: MemoryEngine) -> Self {
        Self { engine }
    }
}

impl EngineProvider for MemoryEngineProvider {
    fn engine(&self, _id: DatabaseId, _data_dir: &Path) -> Box<dyn StorageEngine> {
        Box::new(self.engine.clone())
    }
}
