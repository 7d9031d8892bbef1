//! Scope merging.
//!
//! Scopes are filters that are folded into every request of a model or a
//! connector. Merging never drops a `where` constraint that is already in
//! place: two trees are combined under `and` with the base first.
//!
//! # Example
//!
//! ```
//! use index_bridge::{merge, Filter, MergeOptions};
//! use serde_json::json;
//!
//! let mut filter = Filter::new().with_where(json!({ "state": "OR" }));
//! let scope = Filter::new().with_where(json!({ "active": true })).limit(20);
//!
//! merge(&mut filter, &scope, &MergeOptions::default());
//!
//! assert_eq!(
//!     filter.where_,
//!     Some(json!({ "and": [{ "state": "OR" }, { "active": true }] }))
//! );
//! assert_eq!(filter.limit, Some(20));
//! ```

use serde_json::{Map, Value};

use crate::filter::Filter;

/// Per-call switches for [`merge`].
///
/// Every switch defaults to merging; turning one off keeps the base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Merge `include` at all.
    pub include: bool,
    /// Wrap the base include tree inside the update's relation instead of
    /// merging both at the same level.
    pub nested_include: bool,
    pub collect: bool,
    /// Replace the base projection; when off, the lists are concatenated.
    pub overwrite_fields: bool,
    /// Let the update's order replace an existing one.
    pub override_order: bool,
    pub limit: bool,
    pub skip: bool,
    pub offset: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            include: true,
            nested_include: false,
            collect: true,
            overwrite_fields: true,
            override_order: false,
            limit: true,
            skip: true,
            offset: true,
        }
    }
}

impl MergeOptions {
    /// Merges only the `where` tree, leaving everything else to the base.
    pub fn where_only() -> Self {
        MergeOptions {
            include: false,
            nested_include: false,
            collect: false,
            overwrite_fields: true,
            override_order: false,
            limit: false,
            skip: false,
            offset: false,
        }
    }
}

/// Folds `update` into `base` following the per-field rules.
pub fn merge(base: &mut Filter, update: &Filter, opts: &MergeOptions) {
    if let Some(update_where) = update.structured_where() {
        base.where_ = Some(match base.structured_where() {
            Some(base_where) => combine_where(base_where, update_where),
            None => Value::Object(update_where.clone()),
        });
    }

    if opts.include {
        if let Some(update_include) = update.include.as_ref().filter(|v| !v.is_null()) {
            base.include = Some(match base.include.take().filter(|v| !v.is_null()) {
                None => update_include.clone(),
                Some(saved) => match (opts.nested_include, update_include) {
                    (true, Value::String(relation)) => {
                        let mut nested = Map::new();
                        nested.insert(relation.clone(), saved);
                        Value::Object(nested)
                    }
                    _ => merge_includes(&saved, update_include),
                },
            });
        }
    }

    if opts.collect {
        if let Some(collect) = &update.collect {
            base.collect = Some(collect.clone());
        }
    }

    if let Some(update_fields) = &update.fields {
        if opts.overwrite_fields {
            base.fields = Some(update_fields.clone());
        } else {
            let mut fields = base.fields.take().unwrap_or_default();
            fields.extend(update_fields.iter().cloned());
            base.fields = Some(fields);
        }
    }

    if base.order.is_none() || opts.override_order {
        if let Some(order) = &update.order {
            base.order = Some(order.clone());
        }
    }

    if opts.limit {
        if let Some(limit) = update.limit {
            base.limit = Some(limit);
        }
    }

    if opts.skip && opts.offset {
        if let Some(skip) = update.skip {
            base.skip = Some(skip);
        }
        if let Some(offset) = update.offset {
            base.offset = Some(offset);
        }
    }
}

fn combine_where(base: &Map<String, Value>, update: &Map<String, Value>) -> Value {
    let mut combined = Map::new();
    combined.insert(
        "and".to_string(),
        Value::Array(vec![
            Value::Object(base.clone()),
            Value::Object(update.clone()),
        ]),
    );
    Value::Object(combined)
}

/// Merges two include trees at the same level.
///
/// Both sides are flattened into single-relation entries. Update entries
/// come first; base entries survive only for relations the update does not
/// mention.
pub fn merge_includes(base: &Value, update: &Value) -> Value {
    let base_entries = include_entries(base);
    let update_entries = include_entries(update);
    if base_entries.is_empty() {
        return Value::Array(update_entries);
    }
    if update_entries.is_empty() {
        return Value::Array(base_entries);
    }

    let names: Vec<String> = update_entries.iter().filter_map(relation_name).collect();
    let mut merged = update_entries;
    merged.extend(
        base_entries
            .into_iter()
            .filter(|entry| relation_name(entry).map_or(true, |name| !names.contains(&name))),
    );
    Value::Array(merged)
}

fn include_entries(include: &Value) -> Vec<Value> {
    match include {
        Value::String(relation) => vec![relation_entry(relation)],
        Value::Object(map) if explicit_relation(map).is_some() => vec![include.clone()],
        Value::Object(map) => map
            .iter()
            .map(|(relation, scope)| {
                let mut entry = Map::new();
                entry.insert(relation.clone(), scope.clone());
                Value::Object(entry)
            })
            .collect(),
        Value::Array(items) => items.iter().flat_map(include_entries).collect(),
        _ => Vec::new(),
    }
}

fn relation_entry(relation: &str) -> Value {
    let mut entry = Map::new();
    entry.insert(relation.to_string(), Value::Bool(true));
    Value::Object(entry)
}

fn explicit_relation(map: &Map<String, Value>) -> Option<&str> {
    map.get("relation")
        .or_else(|| map.get("rel"))
        .and_then(Value::as_str)
}

fn relation_name(entry: &Value) -> Option<String> {
    let map = entry.as_object()?;
    explicit_relation(map)
        .or_else(|| map.keys().next().map(String::as_str))
        .map(str::to_string)
}
