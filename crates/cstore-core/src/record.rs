use cstore_engine::Entry;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// The serialized record stored as an engine value.
///
/// The record repeats its key so a value moved under the wrong key is
/// detected on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub key: String,
    pub content_data: Vec<u8>,
}

impl ContentRecord {
    pub fn new(key: impl Into<String>, content_data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            content_data: content_data.into(),
        }
    }

    /// Encode into an engine entry keyed by the record key.
    pub fn to_entry(&self) -> Result<Entry, RecordError> {
        let value =
            bincode::serialize(self).map_err(|e| RecordError::Serialization(e.to_string()))?;
        Ok(Entry::new(self.key.clone(), value))
    }

    /// Decode an engine entry, checking the record names the entry's key.
    pub fn from_entry(entry: &Entry) -> Result<Self, RecordError> {
        let record: Self = bincode::deserialize(&entry.value)
            .map_err(|e| RecordError::Serialization(e.to_string()))?;
        if record.key != entry.key {
            return Err(RecordError::KeyMismatch {
                stored_key: entry.key.clone(),
                record_key: record.key,
            });
        }
        Ok(record)
    }
}
