//! Canonical identity of a normalized object in the [store](crate::store).

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Opaque string identity of a normalized object, e.g. `"Hero:42"` or
/// `"QUERY_ROOT.allAnimals.0"`.
///
/// Equality is plain string equality; ordering exists only so keys can be
/// placed in a [`std::collections::BTreeSet`] for deterministic test output
/// and is not otherwise meaningful.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(CompactString);

impl CacheKey {
    /// The canonical key for the root of a query operation.
    pub const QUERY_ROOT: &'static str = "QUERY_ROOT";
    /// The canonical key for the root of a mutation operation.
    pub const MUTATION_ROOT: &'static str = "MUTATION_ROOT";
    /// The canonical key for the root of a subscription operation.
    pub const SUBSCRIPTION_ROOT: &'static str = "SUBSCRIPTION_ROOT";

    /// Builds a key from an already-formatted string.
    pub fn new(raw: impl Into<CompactString>) -> Self {
        Self(raw.into())
    }

    /// Builds the conventional `Type:id` key for an object with a `__typename`
    /// and an `id` field.
    pub fn for_object(typename: &str, id: impl fmt::Display) -> Self {
        Self(CompactString::from(format!("{typename}:{id}")))
    }

    /// Builds a field-path key nested under a parent key, e.g.
    /// `QUERY_ROOT.hero.friends.0`.
    pub fn nested(parent: &CacheKey, path_segment: impl fmt::Display) -> Self {
        Self(CompactString::from(format!("{parent}.{path_segment}")))
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_object_keys() {
        assert_eq!(CacheKey::for_object("Hero", 42).as_str(), "Hero:42");
    }

    #[test]
    fn nests_path_keys() {
        let root = CacheKey::new(CacheKey::QUERY_ROOT);
        let nested = CacheKey::nested(&root, "allAnimals.0");
        assert_eq!(nested.as_str(), "QUERY_ROOT.allAnimals.0");
    }

    #[test]
    fn equality_is_string_equality() {
        assert_eq!(CacheKey::new("Hero:1"), CacheKey::from("Hero:1".to_string()));
    }
}
