use serde::{Deserialize, Serialize};

/// Write buffer used on regular hardware (64 KiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Write buffer used in low-resource mode (32 KiB).
pub const LOW_RESOURCE_WRITE_BUFFER_SIZE: usize = 32 * 1024;

/// Flush/sync strategy for engine writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write batch.
    EveryWrite,
    /// Rely on OS page-cache buffering.
    #[default]
    OsDefault,
}

/// Options handed to [`StorageEngine::init`](crate::StorageEngine::init).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Size of the in-process write buffer in bytes.
    pub write_buffer_size: usize,
    /// Create the backing store if it does not exist yet.
    pub create_if_missing: bool,
    /// Sync strategy for writes.
    pub sync_mode: SyncMode,
}

impl EngineOptions {
    /// Options tuned for the given resource mode.
    pub fn for_resource_mode(low_resource_mode: bool) -> Self {
        let write_buffer_size = if low_resource_mode {
            LOW_RESOURCE_WRITE_BUFFER_SIZE
        } else {
            DEFAULT_WRITE_BUFFER_SIZE
        };
        Self {
            write_buffer_size,
            ..Self::default()
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            create_if_missing: true,
            sync_mode: SyncMode::default(),
        }
    }
}
