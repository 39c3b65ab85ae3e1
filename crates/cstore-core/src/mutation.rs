use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::MutationError;
use crate::operation::ContentOperation;

/// An ordered batch of operations committed as one logical write.
///
/// Operations are consumed front to back. The creation time is kept for
/// commit latency accounting; it is not serialized and restarts when a
/// mutation is decoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentMutation {
    operations: VecDeque<ContentOperation>,
    #[serde(skip, default = "Instant::now")]
    start_time: Instant,
}

impl ContentMutation {
    /// Create an empty mutation.
    pub fn new() -> Self {
        Self {
            operations: VecDeque::new(),
            start_time: Instant::now(),
        }
    }

    /// Decode a mutation from JSON.
    pub fn from_json(text: &str) -> Result<Self, MutationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode this mutation as JSON.
    pub fn to_json(&self) -> Result<String, MutationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn append_upsert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.push(ContentOperation::upsert(key, value))
    }

    pub fn append_delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(ContentOperation::delete(key))
    }

    pub fn append_delete_by_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.push(ContentOperation::delete_by_prefix(prefix))
    }

    pub fn append_delete_all(&mut self) -> &mut Self {
        self.push(ContentOperation::DeleteAll)
    }

    /// Append any operation.
    pub fn push(&mut self, operation: ContentOperation) -> &mut Self {
        self.operations.push_back(operation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Remove and return the first operation in submission order.
    pub fn take_first_operation(&mut self) -> Option<ContentOperation> {
        self.operations.pop_front()
    }

    /// Operations still pending, in order.
    pub fn operations(&self) -> impl Iterator<Item = &ContentOperation> {
        self.operations.iter()
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Time since this mutation was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ContentMutation {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ContentOperation> for ContentMutation {
    fn from_iter<I: IntoIterator<Item = ContentOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
            start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_come_out_in_submission_order() {
        let mut mutation = ContentMutation::new();
        mutation
            .append_upsert("a", b"1".to_vec())
            .append_delete("b")
            .append_delete_by_prefix("c/")
            .append_delete_all();
        assert_eq!(mutation.len(), 4);

        assert_eq!(
            mutation.take_first_operation(),
            Some(ContentOperation::upsert("a", b"1".to_vec()))
        );
        assert_eq!(mutation.take_first_operation(), Some(ContentOperation::delete("b")));
        assert_eq!(
            mutation.take_first_operation(),
            Some(ContentOperation::delete_by_prefix("c/"))
        );
        assert_eq!(mutation.take_first_operation(), Some(ContentOperation::DeleteAll));
        assert_eq!(mutation.take_first_operation(), None);
        assert!(mutation.is_empty());
    }

    #[test]
    fn new_mutation_is_empty() {
        let mutation = ContentMutation::default();
        assert!(mutation.is_empty());
        assert_eq!(mutation.len(), 0);
    }

    #[test]
    fn json_keeps_operation_order() {
        let mutation: ContentMutation = [
            ContentOperation::DeleteAll,
            ContentOperation::upsert("k", b"v".to_vec()),
        ]
        .into_iter()
        .collect();

        let decoded = ContentMutation::from_json(&mutation.to_json().unwrap()).unwrap();
        let ops: Vec<_> = decoded.operations().cloned().collect();
        assert_eq!(
            ops,
            vec![
                ContentOperation::DeleteAll,
                ContentOperation::upsert("k", b"v".to_vec())
            ]
        );
    }

    #[test]
    fn decodes_hand_written_mutation() {
        let mutation = ContentMutation::from_json(
            r#"{"operations":[{"type":"delete","key":"a"},{"type":"rewrite"}]}"#,
        )
        .unwrap();
        let ops: Vec<_> = mutation.operations().cloned().collect();
        assert_eq!(
            ops,
            vec![ContentOperation::delete("a"), ContentOperation::Unsupported]
        );
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(ContentMutation::from_json("{\"operations\": 3}").is_err());
    }
}
