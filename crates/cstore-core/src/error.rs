use std::path::PathBuf;

/// Errors from loading a [`StoreConfig`](crate::StoreConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for a store config.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from encoding or decoding stored content records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The record bytes could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record was stored under a different key than the one it names.
    #[error("record for {record_key:?} stored under {stored_key:?}")]
    KeyMismatch {
        stored_key: String,
        record_key: String,
    },
}

/// Errors from parsing a serialized [`ContentMutation`](crate::ContentMutation).
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("invalid mutation: {0}")]
    Json(#[from] serde_json::Error),
}
