//! Filter requests and scopes.
//!
//! A [`Filter`] is the structured request a caller hands to the query
//! builder: an optional free-text query, a `where` tree, pagination, a
//! field projection and any extra search parameters. Scopes use the same
//! shape.
//!
//! Decoding is lenient. A known key holding a value of the wrong type is
//! treated as absent instead of failing the whole request.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A structured filter request or scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Free-text search query.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Structured predicate tree.
    #[serde(
        rename = "where",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub where_: Option<Value>,

    /// Pre-compiled filter expression, used verbatim.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,

    /// Field projection, in record field names.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect: Option<Value>,

    /// Every other key, passed on to parameter extraction.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Decodes a filter from a JSON value.
    ///
    /// Fails only when the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes a filter from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the predicate tree.
    pub fn with_where(mut self, clause: impl Into<Value>) -> Self {
        self.where_ = Some(clause.into());
        self
    }

    pub fn filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn include(mut self, include: impl Into<Value>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn order(mut self, order: impl Into<Value>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Adds an extra search parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the predicate tree when it is a non-empty object.
    pub fn structured_where(&self) -> Option<&Map<String, Value>> {
        match &self.where_ {
            Some(Value::Object(map)) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    /// Returns the raw filter expression when it is non-empty.
    pub fn raw_filters(&self) -> Option<&str> {
        self.filters.as_deref().filter(|filters| !filters.is_empty())
    }

    /// Returns the whole filter as one JSON object, extras included.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Deserializes a value, falling back to `None` on a type mismatch.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
