//! Type-erased denormalized payloads backing generated selection-set
//! accessors, and the normalized [`Record`]/[`RecordSet`] shapes stored by
//! [`crate::store::ApolloStore`].

use std::collections::BTreeSet;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::cache_key::CacheKey;

/// A single field's value inside a [`Record`]: either an inline scalar JSON
/// value, or a [`CacheKey`] reference to another normalized object.
///
/// On the wire (inside a serialized [`Record`]) a reference is represented as
/// `{"__ref": "<key>"}`, so a [`Record`] round-trips through plain
/// [`serde_json::Value`] without bespoke tagging machinery.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarOrReference {
    /// Any JSON scalar, list, or (denormalized) object value.
    Scalar(Json),
    /// A reference to another object, keyed by its [`CacheKey`].
    Reference(CacheKey),
    /// A list whose elements may themselves be references (e.g. a list of
    /// objects normalized into their own records).
    List(Vec<ScalarOrReference>),
}

impl ScalarOrReference {
    /// Returns the [`CacheKey`] if this value is a single reference.
    pub fn as_reference(&self) -> Option<&CacheKey> {
        match self {
            Self::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// Collects every [`CacheKey`] reachable from this value, recursing into
    /// lists but not into scalar JSON objects (those are denormalized leaves
    /// by construction — any object keyed by identity was already extracted
    /// into its own [`Record`] by the normalizer).
    pub fn collect_references(&self, into: &mut BTreeSet<CacheKey>) {
        match self {
            Self::Scalar(_) => {}
            Self::Reference(key) => {
                into.insert(key.clone());
            }
            Self::List(items) => {
                for item in items {
                    item.collect_references(into);
                }
            }
        }
    }

    fn to_wire(&self) -> Json {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Reference(key) => serde_json::json!({ "__ref": key.as_str() }),
            Self::List(items) => Json::Array(items.iter().map(Self::to_wire).collect()),
        }
    }

    fn from_wire(value: &Json) -> Self {
        match value {
            Json::Object(map) if map.len() == 1 => match map.get("__ref") {
                Some(Json::String(key)) => Self::Reference(CacheKey::new(key.clone())),
                _ => Self::Scalar(value.clone()),
            },
            Json::Array(items) => Self::List(items.iter().map(Self::from_wire).collect()),
            other => Self::Scalar(other.clone()),
        }
    }
}

impl Serialize for ScalarOrReference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScalarOrReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Json::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

/// Mapping from field-key to [`ScalarOrReference`], forming one normalized
/// object in the [store](crate::store).
pub type Record = IndexMap<CompactString, ScalarOrReference>;

/// Mapping from [`CacheKey`] to [`Record`]; the unit of merge for a single
/// [`crate::store::ApolloStore::publish`] call.
pub type RecordSet = IndexMap<CacheKey, Record>;

/// Type-erased nested mapping backing a generated selection set's field
/// accessors. Its shape matches the generating selection set's selections by
/// construction — nothing in this crate enforces that invariant beyond what
/// the code generator emits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataDict {
    fields: IndexMap<CompactString, Json>,
    fulfilled_fragments: BTreeSet<CompactString>,
}

impl DataDict {
    /// Builds an empty `DataDict` with no fulfilled fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a `DataDict` from already-denormalized fields.
    pub fn from_fields(fields: IndexMap<CompactString, Json>) -> Self {
        Self {
            fields,
            fulfilled_fragments: BTreeSet::new(),
        }
    }

    /// Reads a field's raw JSON value.
    pub fn get(&self, field: &str) -> Option<&Json> {
        self.fields.get(field)
    }

    /// Writes a field's raw JSON value. Intended to be called only through a
    /// generated selection set declared as a local cache mutation (a
    /// `MutableSelectionSet`); this type itself does not enforce that
    /// restriction.
    pub fn set(&mut self, field: impl Into<CompactString>, value: Json) {
        self.fields.insert(field.into(), value);
    }

    /// Marks a fragment identifier as fulfilled by this data.
    pub fn mark_fragment_fulfilled(&mut self, fragment_name: impl Into<CompactString>) {
        self.fulfilled_fragments.insert(fragment_name.into());
    }

    /// Whether the named fragment is known to be materialized in this data.
    pub fn fulfills_fragment(&self, fragment_name: &str) -> bool {
        self.fulfilled_fragments.contains(fragment_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trips_through_json() {
        let value = ScalarOrReference::Reference(CacheKey::new("Hero:1"));
        let wire = serde_json::to_value(&value).unwrap();
        assert_eq!(wire, serde_json::json!({ "__ref": "Hero:1" }));
        let back: ScalarOrReference = serde_json::from_value(wire).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn scalar_round_trips_through_json() {
        let value = ScalarOrReference::Scalar(serde_json::json!("R2-D2"));
        let wire = serde_json::to_value(&value).unwrap();
        let back: ScalarOrReference = serde_json::from_value(wire).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn collects_nested_references() {
        let value = ScalarOrReference::List(vec![
            ScalarOrReference::Reference(CacheKey::new("Human:1")),
            ScalarOrReference::Scalar(Json::Null),
            ScalarOrReference::Reference(CacheKey::new("Human:2")),
        ]);
        let mut into = BTreeSet::new();
        value.collect_references(&mut into);
        assert_eq!(into.len(), 2);
    }

    #[test]
    fn data_dict_tracks_fulfilled_fragments() {
        let mut dict = DataDict::new();
        assert!(!dict.fulfills_fragment("HeroDetails"));
        dict.mark_fragment_fulfilled("HeroDetails");
        assert!(dict.fulfills_fragment("HeroDetails"));
    }
}
