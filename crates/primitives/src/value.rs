use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// An opaque, tree-shaped structured value used for version bodies and
/// metadata. Cyclic references are impossible by construction (this is an
/// owned tree, not a graph) — see spec.md §9 "Cyclic references in
/// payloads: forbid."
///
/// `Map` entries are always kept sorted by key (enforced by every
/// constructor) so structural equality is deep equality regardless of the
/// order keys were inserted in, and so the canonical encoding in
/// [`crate::canonical`] never has to re-sort at hash time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Builds a `Map` value from key/value pairs, sorting by key and
    /// keeping the last value on duplicate keys.
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut map: BTreeMap<String, Value> = BTreeMap::new();
        for (k, v) in entries {
            map.insert(k, v);
        }
        Value::Map(map.into_iter().collect())
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a key in a `Map` value (binary search, entries are sorted).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let entries = self.as_map()?;
        entries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| &entries[idx].1)
    }

    /// All keys present in this value if it is a `Map`, else empty.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.as_map()
            .map(|entries| entries.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_sorts_and_dedups() {
        let v = Value::map([
            ("b".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(3)),
        ]);
        assert_eq!(v.keys(), vec!["a", "b"]);
        assert_eq!(v.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn equal_regardless_of_construction_order() {
        let a = Value::map([("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]);
        let b = Value::map([("y".into(), Value::Int(2)), ("x".into(), Value::Int(1))]);
        assert_eq!(a, b);
    }
}
