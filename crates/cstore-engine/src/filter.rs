use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single stored key/value pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Key predicate expressed as data.
///
/// Engines receive a `KeyFilter` instead of an opaque closure so the
/// predicate can be inspected, logged, and tested on its own. Matching is
/// byte-exact and case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyFilter {
    /// Every key matches.
    All,
    /// Keys starting with the given prefix match. An empty prefix matches
    /// every key.
    Prefix(String),
    /// Keys contained in the set match.
    Keys(HashSet<String>),
}

impl KeyFilter {
    /// Build a prefix filter.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Build an exact key-set filter.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if `key` satisfies this filter.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
            Self::Keys(set) => set.contains(key),
        }
    }

    /// The narrowest key range an engine may scan without missing matches.
    pub fn scan_prefix(&self) -> &str {
        match self {
            Self::Prefix(prefix) => prefix,
            Self::All | Self::Keys(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefix_is_case_sensitive() {
        let filter = KeyFilter::prefix("x/");
        assert!(filter.matches("x/1"));
        assert!(!filter.matches("X/1"));
        assert!(!filter.matches("y/1"));
        assert!(!filter.matches("x"));
    }

    #[test]
    fn matching_compares_bytes_not_characters() {
        // Precomposed and decomposed forms of the same character.
        let filter = KeyFilter::prefix("caf\u{e9}/");
        assert!(filter.matches("caf\u{e9}/1"));
        assert!(!filter.matches("cafe\u{301}/1"));

        let filter = KeyFilter::keys(["caf\u{e9}"]);
        assert!(!filter.matches("cafe\u{301}"));
        assert!(!filter.matches("CAF\u{c9}"));
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let filter = KeyFilter::prefix("");
        assert!(filter.matches(""));
        assert!(filter.matches("anything"));
        assert_eq!(filter.scan_prefix(), "");
    }

    #[test]
    fn key_set_matches_members_only() {
        let filter = KeyFilter::keys(["a", "c"]);
        assert!(filter.matches("a"));
        assert!(filter.matches("c"));
        assert!(!filter.matches("b"));
        assert!(!filter.matches("ab"));
        assert_eq!(filter.scan_prefix(), "");
    }

    #[test]
    fn all_matches_everything() {
        assert!(KeyFilter::All.matches(""));
        assert!(KeyFilter::All.matches("k"));
    }

    proptest! {
        #[test]
        fn prefix_filter_agrees_with_starts_with(key in "[a-c/]{0,8}", prefix in "[a-c/]{0,3}") {
            let filter = KeyFilter::prefix(prefix.clone());
            prop_assert_eq!(filter.matches(&key), key.starts_with(&prefix));
        }
    }
}
