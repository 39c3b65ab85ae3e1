use std::fmt;

use serde::{Deserialize, Serialize};

/// One primitive change to the content store.
///
/// `Unsupported` is what a decoder yields for an operation type it does not
/// know, e.g. one written by a newer producer. Committing it fails the whole
/// mutation without touching the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentOperation {
    /// Insert or overwrite `key`.
    Upsert { key: String, value: Vec<u8> },
    /// Remove `key` if present.
    Delete { key: String },
    /// Remove every key starting with `prefix`.
    DeleteByPrefix { prefix: String },
    /// Remove every key. Same as `DeleteByPrefix` with an empty prefix.
    DeleteAll,
    /// An operation type this build does not recognise.
    #[serde(other)]
    Unsupported,
}

impl ContentOperation {
    pub fn upsert(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Upsert {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn delete_by_prefix(prefix: impl Into<String>) -> Self {
        Self::DeleteByPrefix {
            prefix: prefix.into(),
        }
    }

    /// Short name of the operation type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Delete { .. } => "delete",
            Self::DeleteByPrefix { .. } => "delete_by_prefix",
            Self::DeleteAll => "delete_all",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ContentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upsert { key, value } => write!(f, "upsert {key:?} ({} bytes)", value.len()),
            Self::Delete { key } => write!(f, "delete {key:?}"),
            Self::DeleteByPrefix { prefix } => write!(f, "delete prefix {prefix:?}"),
            Self::DeleteAll => f.write_str("delete all"),
            Self::Unsupported => f.write_str("unsupported operation"),
        }
    }
}
