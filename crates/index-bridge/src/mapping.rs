//! Field mapping between the record and document key spaces.
//!
//! A [`FieldMapping`] renames keys from one flat key space to another.
//! Records use application field names (`id`, `tags`), documents use index
//! field names (`objectID`, `_tags`). The same mapping type serves both
//! directions; [`FieldMapping::invert`] flips it.
//!
//! # Example
//!
//! ```
//! use index_bridge::FieldMapping;
//! use serde_json::json;
//!
//! let mapping = FieldMapping::new().with("id", "objectID").with("tags", "_tags");
//!
//! let record = json!({ "id": "c-1", "tags": ["a"], "city": "Salem" });
//! let document = mapping.project(record.as_object().unwrap(), true);
//!
//! assert_eq!(
//!     serde_json::Value::Object(document),
//!     json!({ "objectID": "c-1", "_tags": ["a"], "city": "Salem" })
//! );
//! ```

use std::collections::HashSet;

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::op;
use crate::path;

/// Key of the identifier field on the record side.
pub const ID_FIELD: &str = "id";

/// Key of the identifier field on the document side.
pub const DOCUMENT_ID_FIELD: &str = "objectID";

/// Ordered `from -> to` key mapping.
///
/// Entries mapped to `None` are kept for bookkeeping but never translate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: IndexMap<String, Option<String>>,
}

impl FieldMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        FieldMapping::default()
    }

    /// Adds a `from -> to` entry.
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.insert(from, to);
        self
    }

    /// Adds an entry that explicitly excludes `from` from translation.
    pub fn without(mut self, from: impl Into<String>) -> Self {
        self.entries.insert(from.into(), None);
        self
    }

    /// Adds or replaces a `from -> to` entry.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.entries.insert(from.into(), Some(to.into()));
    }

    /// Overlays `other` on top of this mapping; its entries win.
    pub fn extend(&mut self, other: &FieldMapping) {
        for (from, to) in &other.entries {
            self.entries.insert(from.clone(), to.clone());
        }
    }

    /// Returns the mapped target of `from`, if any.
    pub fn get(&self, from: &str) -> Option<&str> {
        self.entries.get(from).and_then(|to| to.as_deref())
    }

    /// Returns the active `from -> to` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(from, to)| to.as_deref().map(|to| (from.as_str(), to)))
    }

    /// Returns every key that is mapped to a target.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.pairs().map(|(from, _)| from)
    }

    /// Returns every target key.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.pairs().map(|(_, to)| to)
    }

    /// Returns `true` if the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Swaps every active pair. Excluded entries are dropped.
    pub fn invert(&self) -> FieldMapping {
        let entries = self
            .pairs()
            .map(|(from, to)| (to.to_string(), Some(from.to_string())))
            .collect();
        FieldMapping { entries }
    }

    /// Translates a single key, falling back to the key itself.
    pub fn rename<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).unwrap_or(key)
    }

    /// Projects `source` through the mapping.
    ///
    /// Mapped entries read and write dotted paths. With `merge_unmapped`,
    /// top-level keys no entry consumed are copied through unchanged first,
    /// so a mapped value always wins over a passthrough key of the same name.
    pub fn project(&self, source: &Map<String, Value>, merge_unmapped: bool) -> Map<String, Value> {
        let mut mapped = Map::new();
        let mut consumed = HashSet::new();

        for (from, to) in self.pairs() {
            if let Some(value) = path::get_in(source, from) {
                consumed.insert(from);
                path::set(&mut mapped, to, value.clone());
            }
        }

        if !merge_unmapped {
            return mapped;
        }

        let mut result: Map<String, Value> = source
            .iter()
            .filter(|(key, _)| !consumed.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in mapped {
            result.insert(key, value);
        }
        result
    }

    /// Renames the field keys of a `where` tree.
    ///
    /// Operator keys are left alone, as are keys inside operator values
    /// that are not themselves clauses. The tree is rebuilt, never mutated.
    pub fn translate_where(&self, clause: &Value) -> Value {
        format_keys(clause, |key| {
            if op::is_reserved(key) {
                key.to_string()
            } else {
                self.rename(key).to_string()
            }
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (from, to) in iter {
            mapping.insert(from, to);
        }
        mapping
    }
}

/// Serialize and normalize mappings resolved for one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMapping {
    /// Record to document.
    pub serialize: FieldMapping,
    /// Document to record.
    pub normalize: FieldMapping,
}

impl ModelMapping {
    /// Resolves the connector-wide mappings.
    ///
    /// Without an explicit normalize mapping the serialize mapping is
    /// inverted. The identifier pair `id`/`objectID` is always present.
    pub fn resolve(serialize: Option<&FieldMapping>, normalize: Option<&FieldMapping>) -> Self {
        let mut serialize = serialize.cloned().unwrap_or_default();
        let mut normalize = normalize.cloned().unwrap_or_else(|| serialize.invert());
        serialize.insert(ID_FIELD, DOCUMENT_ID_FIELD);
        normalize.insert(DOCUMENT_ID_FIELD, ID_FIELD);
        ModelMapping {
            serialize,
            normalize,
        }
    }

    /// Layers a model's own mappings over these.
    ///
    /// The model's normalize mapping defaults to the inverse of the combined
    /// serialize mapping.
    pub fn for_model(
        &self,
        serialize: Option<&FieldMapping>,
        normalize: Option<&FieldMapping>,
    ) -> Self {
        let mut combined = self.serialize.clone();
        if let Some(custom) = serialize {
            combined.extend(custom);
        }
        let mut inverse = self.normalize.clone();
        match normalize {
            Some(custom) => inverse.extend(custom),
            None => inverse.extend(&combined.invert()),
        }
        ModelMapping {
            serialize: combined,
            normalize: inverse,
        }
    }
}

/// Rebuilds a value tree with every object key passed through `rename`.
///
/// Binary object identifiers (`{"$oid": "..."}`) are collapsed to their
/// string form before anything else, so opaque handles never leak into the
/// output.
pub fn format_keys<F>(value: &Value, rename: F) -> Value
where
    F: Fn(&str) -> String,
{
    format_keys_with(value, &rename)
}

fn format_keys_with<F>(value: &Value, rename: &F) -> Value
where
    F: Fn(&str) -> String,
{
    if let Some(id) = object_id(value) {
        return Value::String(id.to_string());
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (rename(key), format_keys_with(child, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| format_keys_with(item, rename))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Rewrites every object key into the given case convention.
pub fn convert_key_case(value: &Value, case: Case) -> Value {
    format_keys(value, |key| key.to_case(case))
}

/// Returns the string form of a binary object identifier value.
pub fn object_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("$oid").and_then(Value::as_str),
        _ => None,
    }
}
