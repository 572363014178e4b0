use std::collections::BTreeSet;

use perspectivedb_primitives::Value;

/// Result of a three-way body merge (spec §4.3.2): either a merged body or
/// a list of attribute paths that conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreeWayResult {
    Merged(Value),
    Conflict(Vec<String>),
}

/// Merges `x` and `y` against their common `base`, key by key.
///
/// Bodies are treated as `Map` values (the document case); a non-`Map`
/// body is treated as having no keys, so it contributes nothing and takes
/// whatever the other two sides agree on. Key absence on one side is
/// "deleted relative to base" — the generic equal/base-match rule already
/// covers "delete if both deleted, conflict if only one side mutated"
/// because a deleted key compares as `None` just like any other value.
pub fn three_way_merge(base: &Value, x: &Value, y: &Value) -> ThreeWayResult {
    let base_map = base.as_map().unwrap_or(&[]);
    let x_map = x.as_map().unwrap_or(&[]);
    let y_map = y.as_map().unwrap_or(&[]);

    let mut keys: BTreeSet<&str> = BTreeSet::new();
    keys.extend(x_map.iter().map(|(k, _)| k.as_str()));
    keys.extend(y_map.iter().map(|(k, _)| k.as_str()));

    let mut merged = Vec::new();
    let mut conflicts = Vec::new();

    for key in keys {
        let xv = lookup(x_map, key);
        let yv = lookup(y_map, key);
        let bv = lookup(base_map, key);

        if xv == yv {
            if let Some(v) = xv {
                merged.push((key.to_string(), v.clone()));
            }
        } else if xv == bv {
            if let Some(v) = yv {
                merged.push((key.to_string(), v.clone()));
            }
        } else if yv == bv {
            if let Some(v) = xv {
                merged.push((key.to_string(), v.clone()));
            }
        } else {
            conflicts.push(key.to_string());
        }
    }

    if conflicts.is_empty() {
        ThreeWayResult::Merged(Value::map(merged))
    } else {
        ThreeWayResult::Conflict(conflicts)
    }
}

fn lookup<'a>(map: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    map.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(entries: &[(&str, i64)]) -> Value {
        Value::map(entries.iter().map(|(k, v)| (k.to_string(), Value::Int(*v))))
    }

    #[test]
    fn unchanged_key_survives() {
        let base = doc(&[("a", 1)]);
        let x = doc(&[("a", 1)]);
        let y = doc(&[("a", 1)]);
        assert_eq!(three_way_merge(&base, &x, &y), ThreeWayResult::Merged(doc(&[("a", 1)])));
    }

    #[test]
    fn one_side_edits_wins() {
        let base = doc(&[("a", 1)]);
        let x = doc(&[("a", 2)]);
        let y = doc(&[("a", 1)]);
        assert_eq!(three_way_merge(&base, &x, &y), ThreeWayResult::Merged(doc(&[("a", 2)])));
    }

    #[test]
    fn both_sides_delete_is_not_a_conflict() {
        let base = doc(&[("a", 1), ("b", 1)]);
        let x = doc(&[("b", 1)]);
        let y = doc(&[("b", 1)]);
        assert_eq!(three_way_merge(&base, &x, &y), ThreeWayResult::Merged(doc(&[("b", 1)])));
    }

    #[test]
    fn one_side_deletes_other_unchanged() {
        let base = doc(&[("a", 1), ("b", 1)]);
        let x = doc(&[("b", 1)]); // x deleted a
        let y = doc(&[("a", 1), ("b", 1)]); // y unchanged
        assert_eq!(three_way_merge(&base, &x, &y), ThreeWayResult::Merged(doc(&[("b", 1)])));
    }

    #[test]
    fn divergent_edits_conflict() {
        let base = doc(&[("a", 1)]);
        let x = doc(&[("a", 2)]);
        let y = doc(&[("a", 3)]);
        assert_eq!(three_way_merge(&base, &x, &y), ThreeWayResult::Conflict(vec!["a".to_string()]));
    }
}
