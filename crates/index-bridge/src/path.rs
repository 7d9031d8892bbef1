//! Dotted key-path access over JSON values.
//!
//! Paths like `"address.city"` address nested objects. A key that literally
//! contains the dot wins over the nested interpretation, so flat documents
//! with dotted keys still resolve.

use serde_json::{Map, Value};

/// Looks up `path` inside `value`.
///
/// Numeric segments index into arrays. Returns `None` when any segment is
/// missing; an explicit `null` is returned as `Some(&Value::Null)`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Value::Object(map) = value {
        if let Some(found) = map.get(path) {
            return Some(found);
        }
    }
    if path.is_empty() {
        return None;
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Looks up `path` inside an object.
pub fn get_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(found) = map.get(path) {
        return Some(found);
    }
    let (head, rest) = path.split_once('.')?;
    get(map.get(head)?, rest)
}

/// Writes `value` at `path`, creating intermediate objects as needed.
///
/// Intermediate values that are not objects are replaced.
pub fn set(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                set(child, rest, value);
            }
        }
    }
}

/// Recursively merges `source` into `target`.
///
/// Nested objects are merged key by key; any other source value replaces
/// the target value.
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                deep_merge(existing, nested);
            }
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Fills keys of `target` that are absent, leaving present keys untouched.
pub fn fill_defaults(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}
