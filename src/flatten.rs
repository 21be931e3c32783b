//! Dotted-key codec for nested `serde_json` maps.
//!
//! Every merge step works on a single-level view of the value tree:
//! `{"train": {"lr": 0.1}}` becomes `{"train.lr": 0.1}`. [`unflatten`]
//! reverses it and refuses to silently overwrite a leaf with a subtree.

use serde_json::{Map, Value};

use crate::error::ArgError;

/// Join a key onto a dotted prefix. An empty prefix yields the key itself.
pub fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Flatten nested maps in place.
///
/// Each object value at any depth is replaced by `"{parent}.{child}"` entries
/// for its children and the original key is removed. Arrays and scalars are
/// left untouched. An empty nested map leaves no entries behind.
pub fn flatten(map: &mut Map<String, Value>) {
    let nested: Vec<String> = map
        .iter()
        .filter(|(_, v)| v.is_object())
        .map(|(k, _)| k.clone())
        .collect();

    for key in nested {
        if let Some(Value::Object(mut child)) = map.remove(&key) {
            flatten(&mut child);
            for (child_key, value) in child {
                map.insert(dotted(&key, &child_key), value);
            }
        }
    }
}

/// Rebuild nested maps from dotted keys, in place.
///
/// Keys are processed in reverse-sorted order so overlapping prefixes resolve
/// the same way on every run. Fails with [`ArgError::KeyConflict`] when a path
/// segment already holds a non-map value.
pub fn unflatten(map: &mut Map<String, Value>) -> Result<(), ArgError> {
    let mut keys: Vec<String> = map.keys().filter(|k| k.contains('.')).cloned().collect();
    keys.sort_unstable_by(|a, b| b.cmp(a));

    for key in keys {
        let Some(value) = map.remove(&key) else {
            continue;
        };
        insert_path(map, &key, value)?;
    }
    Ok(())
}

fn insert_path(map: &mut Map<String, Value>, key: &str, value: Value) -> Result<(), ArgError> {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = map;
    for (i, segment) in parents.iter().enumerate() {
        let entry = current
            .entry(*segment)
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(child) => child,
            _ => {
                return Err(ArgError::KeyConflict {
                    key: key.to_string(),
                    conflicting: segments[..=i].join("."),
                });
            }
        };
    }

    if let Some(Value::Object(existing)) = current.get(*leaf) {
        let conflicting = existing
            .keys()
            .next()
            .map(|child| dotted(key, child))
            .unwrap_or_else(|| key.to_string());
        return Err(ArgError::KeyConflict {
            key: key.to_string(),
            conflicting,
        });
    }

    current.insert(leaf.to_string(), value);
    Ok(())
}
