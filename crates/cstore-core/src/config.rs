use std::path::{Path, PathBuf};

use cstore_engine::{EngineOptions, SyncMode};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning for a content store.
///
/// Loaded from TOML:
///
/// ```toml
/// data_dir = "/var/cache/cstore"
/// low_resource_mode = true
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the store's databases.
    pub data_dir: PathBuf,
    /// Use a smaller engine write buffer on constrained hardware.
    pub low_resource_mode: bool,
    /// Sync strategy for engine writes.
    pub sync_mode: SyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            low_resource_mode: false,
            sync_mode: SyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Engine options derived from this tuning.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            sync_mode: self.sync_mode,
            ..EngineOptions::for_resource_mode(self.low_resource_mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cstore_engine::{DEFAULT_WRITE_BUFFER_SIZE, LOW_RESOURCE_WRITE_BUFFER_SIZE};

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.data_dir, PathBuf::from("."));
        assert!(!c.low_resource_mode);
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.engine_options().write_buffer_size, DEFAULT_WRITE_BUFFER_SIZE);
    }

    #[test]
    fn parse_full_config() {
        let c = StoreConfig::from_toml_str(
            r#"
            data_dir = "/tmp/cstore"
            low_resource_mode = true
            sync_mode = "every_write"
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/tmp/cstore"));
        let opts = c.engine_options();
        assert_eq!(opts.write_buffer_size, LOW_RESOURCE_WRITE_BUFFER_SIZE);
        assert_eq!(opts.sync_mode, SyncMode::EveryWrite);
        assert!(opts.create_if_missing);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c = StoreConfig::from_toml_str("low_resource_mode = true").unwrap();
        assert_eq!(c.data_dir, PathBuf::from("."));
        assert!(c.low_resource_mode);
    }

    #[test]
    fn rejects_unknown_sync_mode() {
        assert!(matches!(
            StoreConfig::from_toml_str(r#"sync_mode = "sometimes""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cstore.toml");
        std::fs::write(&path, "data_dir = \"cache\"\n").unwrap();
        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.data_dir, PathBuf::from("cache"));

        let err = StoreConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
