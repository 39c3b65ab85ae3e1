use std::io;
use std::path::PathBuf;

/// Errors produced by storage engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine was used before `init` completed successfully.
    #[error("engine is not initialized")]
    NotInitialized,

    /// `init` was called on an engine that already finished initializing.
    #[error("engine is already initialized")]
    AlreadyInitialized,

    /// The database directory does not exist and creation was not requested.
    #[error("database path not found: {0}")]
    NotFound(PathBuf),

    /// I/O error from the backing files.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A log frame passed its checksum but could not be decoded.
    #[error("corrupt log at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// Failure injected by a test engine.
    #[error("injected failure: {0}")]
    Injected(&'static str),

    /// The blocking worker running an engine call panicked or was cancelled.
    #[error("engine worker failed: {0}")]
    Worker(String),
}

/// Convenience alias used throughout the engine crate.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
