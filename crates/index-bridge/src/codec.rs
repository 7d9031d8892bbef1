//! Record and document conversion.
//!
//! A [`Codec`] is resolved once per model and converts in both directions:
//!
//! - [`Codec::serialize`]: record to index document
//! - [`Codec::normalize`]: index document to record
//!
//! Serialization runs timestamp coercion, strict filtering, defaults,
//! attribute overrides, the field mapping and finally `omit`/`pick`.
//! Normalization runs the inverse mapping, timestamp coercion and strict
//! filtering.
//!
//! Coercion is best-effort: a timestamp field holding something that is
//! neither a number nor a date is left as it is.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::trace;

use crate::date;
use crate::mapping::ModelMapping;
use crate::path;
use crate::Document;

/// Which way a value is being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Record to document.
    Serialize,
    /// Document to record.
    Normalize,
}

/// Information handed to computed default and attribute sources.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub model: &'a str,
    /// The record as it stands when the source is resolved.
    pub record: &'a Document,
    pub options: &'a SerializeOptions,
}

type ComputeFn = dyn Fn(&SourceContext<'_>) -> Document + Send + Sync;

/// Source of default or override values.
#[derive(Clone)]
pub enum ValueSource {
    /// A fixed set of values.
    Static(Document),
    /// Values computed per record.
    Computed(Arc<ComputeFn>),
}

impl ValueSource {
    /// Wraps a closure as a computed source.
    pub fn computed<F>(compute: F) -> Self
    where
        F: Fn(&SourceContext<'_>) -> Document + Send + Sync + 'static,
    {
        ValueSource::Computed(Arc::new(compute))
    }

    /// Produces the values for one record.
    pub fn resolve(&self, ctx: &SourceContext<'_>) -> Document {
        match self {
            ValueSource::Static(values) => values.clone(),
            ValueSource::Computed(compute) => compute(ctx),
        }
    }
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Static(values) => f.debug_tuple("Static").field(values).finish(),
            ValueSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Document> for ValueSource {
    fn from(values: Document) -> Self {
        ValueSource::Static(values)
    }
}

impl<'de> Deserialize<'de> for ValueSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Document::deserialize(deserializer).map(ValueSource::Static)
    }
}

type HookFn = dyn Fn(&Value, Direction) -> Option<Value> + Send + Sync;

/// Replaces the built-in timestamp coercion for a model.
///
/// Returning `None` leaves the value untouched.
#[derive(Clone)]
pub struct TimestampHook(Arc<HookFn>);

impl TimestampHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&Value, Direction) -> Option<Value> + Send + Sync + 'static,
    {
        TimestampHook(Arc::new(hook))
    }

    pub fn apply(&self, value: &Value, direction: Direction) -> Option<Value> {
        (self.0)(value, direction)
    }
}

impl fmt::Debug for TimestampHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimestampHook(..)")
    }
}

/// Per-call serialization options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerializeOptions {
    /// Keep only these document keys.
    pub pick: Option<Vec<String>>,
    /// Drop these document keys.
    pub omit: Option<Vec<String>>,
    /// Fill missing fields from default sources. Unset means the entry
    /// point decides: on for inserts, off for partial updates.
    pub serialize_defaults: Option<bool>,
    /// Write batch size for bulk indexing.
    pub batch_size: Option<usize>,
    /// Index override for the request.
    pub index_name: Option<String>,
}

impl SerializeOptions {
    pub fn new() -> Self {
        SerializeOptions::default()
    }

    pub fn pick<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pick = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn omit<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_defaults(self) -> Self {
        self.serialize_defaults(false)
    }

    pub fn serialize_defaults(mut self, enabled: bool) -> Self {
        self.serialize_defaults = Some(enabled);
        self
    }

    /// Whether defaults apply, falling back to `unset` when no choice was
    /// made.
    pub fn defaults_enabled(&self, unset: bool) -> bool {
        self.serialize_defaults.unwrap_or(unset)
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }
}

/// Bidirectional converter for one model.
#[derive(Debug, Clone)]
pub struct Codec {
    model: String,
    mapping: ModelMapping,
    timestamps: Vec<String>,
    strict_keys: Option<HashSet<String>>,
    defaults: Vec<ValueSource>,
    attributes: Vec<ValueSource>,
    timestamp_hook: Option<TimestampHook>,
}

impl Codec {
    /// Creates a codec with no coercion, no strict mode and no sources.
    pub fn new(model: impl Into<String>, mapping: ModelMapping) -> Self {
        Codec {
            model: model.into(),
            mapping,
            timestamps: Vec::new(),
            strict_keys: None,
            defaults: Vec::new(),
            attributes: Vec::new(),
            timestamp_hook: None,
        }
    }

    /// Declares the fields holding timestamps.
    pub fn timestamps<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamps = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Enables strict mode with the given declared properties.
    ///
    /// Record-side keys of the mapping are always allowed as well.
    pub fn strict<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: HashSet<String> = properties.into_iter().map(Into::into).collect();
        keys.extend(self.mapping.serialize.sources().map(str::to_string));
        keys.extend(self.mapping.normalize.targets().map(str::to_string));
        self.strict_keys = Some(keys);
        self
    }

    /// Appends a default source. Earlier sources take precedence.
    pub fn defaults(mut self, source: ValueSource) -> Self {
        self.defaults.push(source);
        self
    }

    /// Appends an attribute source. Later sources win.
    pub fn attributes(mut self, source: ValueSource) -> Self {
        self.attributes.push(source);
        self
    }

    pub fn timestamp_hook(mut self, hook: TimestampHook) -> Self {
        self.timestamp_hook = Some(hook);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mapping(&self) -> &ModelMapping {
        &self.mapping
    }

    pub fn is_strict(&self) -> bool {
        self.strict_keys.is_some()
    }

    /// Converts a record into an index document.
    pub fn serialize(&self, record: &Document, options: &SerializeOptions) -> Document {
        let mut data = record.clone();
        self.coerce_timestamps(&mut data, Direction::Serialize);
        let mut data = self.restrict(data);

        if options.defaults_enabled(true) {
            for source in &self.defaults {
                let values = source.resolve(&self.source_context(&data, options));
                path::fill_defaults(&mut data, &values);
            }
        }
        for source in &self.attributes {
            let values = source.resolve(&self.source_context(&data, options));
            path::deep_merge(&mut data, &values);
        }

        let mut document = self.mapping.serialize.project(&data, true);
        if let Some(omit) = &options.omit {
            document.retain(|key, _| !omit.contains(key));
        }
        if let Some(pick) = &options.pick {
            document.retain(|key, _| pick.contains(key));
        }

        trace!(model = %self.model, fields = document.len(), "serialized record");
        document
    }

    /// Converts an index document back into a record.
    pub fn normalize(&self, document: &Document) -> Document {
        let mut data = self.mapping.normalize.project(document, true);
        self.coerce_timestamps(&mut data, Direction::Normalize);
        let data = self.restrict(data);

        trace!(model = %self.model, fields = data.len(), "normalized document");
        data
    }

    fn source_context<'a>(
        &'a self,
        record: &'a Document,
        options: &'a SerializeOptions,
    ) -> SourceContext<'a> {
        SourceContext {
            model: &self.model,
            record,
            options,
        }
    }

    fn coerce_timestamps(&self, data: &mut Document, direction: Direction) {
        for field in &self.timestamps {
            let Some(value) = data.get(field) else {
                continue;
            };
            let coerced = match (&self.timestamp_hook, direction) {
                (Some(hook), _) => hook.apply(value, direction),
                (None, Direction::Serialize) => date::to_epoch(value),
                (None, Direction::Normalize) => date::from_epoch(value),
            };
            match coerced {
                Some(coerced) => {
                    data.insert(field.clone(), coerced);
                }
                None => trace!(model = %self.model, field = %field, "timestamp left as is"),
            }
        }
    }

    fn restrict(&self, data: Document) -> Document {
        match &self.strict_keys {
            Some(keys) => data
                .into_iter()
                .filter(|(key, _)| keys.contains(key))
                .collect(),
            None => data,
        }
    }
}
