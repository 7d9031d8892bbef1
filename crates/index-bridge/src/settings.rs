//! Connector and model configuration.
//!
//! Configuration is plain serde data with camelCase keys and loads from
//! JSON or YAML. Keys the bridge does not know about (credentials, client
//! options) are ignored. Computed sources and timestamp hooks cannot be
//! expressed as data and are attached with builder methods.
//!
//! # Example
//!
//! ```
//! use index_bridge::ModelDefinition;
//!
//! let contact = ModelDefinition::from_yaml(r#"
//! name: Contact
//! strict: true
//! properties:
//!   firstname: { type: String, searchable: 1 }
//!   state: { type: String, facet: true }
//!   registeredAt: { type: Date, facet: filter }
//! settings:
//!   indexName: dev_contacts
//!   mapping: { tags: _tags }
//! "#).unwrap();
//!
//! assert!(contact.strict);
//! assert_eq!(contact.settings.index_name.as_deref(), Some("dev_contacts"));
//! assert!(contact.properties["registeredAt"].is_timestamp());
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::{TimestampHook, ValueSource};
use crate::error::Result;
use crate::filter::{lenient, Filter};
use crate::mapping::FieldMapping;
use crate::Document;

/// Connector-wide settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorSettings {
    /// Index used by models that do not name their own.
    pub index_name: Option<String>,
    /// Extra index names any model may address.
    pub valid_indexes: Vec<String>,
    pub mapping: Option<FieldMapping>,
    /// Takes precedence over `mapping`.
    pub serialize_mapping: Option<FieldMapping>,
    pub normalize_mapping: Option<FieldMapping>,
    /// Scope folded into every query.
    pub query_scope: Option<Filter>,
    /// Index settings every model starts from.
    pub index: Document,
    pub batch_size: Option<usize>,
    pub defaults: Option<ValueSource>,
    pub attributes: Option<ValueSource>,
}

impl ConnectorSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Returns the serialize mapping, preferring the explicit one.
    pub fn serialize_mapping(&self) -> Option<&FieldMapping> {
        self.serialize_mapping.as_ref().or(self.mapping.as_ref())
    }
}

/// How a property takes part in full-text search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Searchable {
    Flag(bool),
    /// Position in the searchable attribute list, lowest first.
    Rank(f64),
}

impl Searchable {
    /// Sort key, or `None` when the property is not searchable.
    pub fn rank(self) -> Option<f64> {
        match self {
            Searchable::Flag(true) => Some(f64::INFINITY),
            Searchable::Flag(false) => None,
            Searchable::Rank(rank) => Some(rank),
        }
    }
}

/// How a property is exposed for faceting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Facet {
    Flag(bool),
    Mode(FacetMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetMode {
    /// Filterable only, no facet counts.
    Filter,
    /// Facet values are themselves searchable.
    Searchable,
}

impl Facet {
    /// Renders the faceting attribute entry for a property.
    pub fn attribute(self, name: &str) -> Option<String> {
        match self {
            Facet::Flag(true) => Some(name.to_string()),
            Facet::Flag(false) => None,
            Facet::Mode(FacetMode::Filter) => Some(format!("filterOnly({name})")),
            Facet::Mode(FacetMode::Searchable) => Some(format!("searchable({name})")),
        }
    }
}

/// A declared model property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDef {
    /// Type name, such as `String`, `Number` or `Date`.
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
    /// Marks the identifier property.
    pub id: bool,
    #[serde(deserialize_with = "lenient")]
    pub searchable: Option<Searchable>,
    #[serde(deserialize_with = "lenient")]
    pub facet: Option<Facet>,
    pub retrievable: bool,
    pub unretrievable: bool,
}

impl PropertyDef {
    pub fn new(kind: impl Into<String>) -> Self {
        PropertyDef {
            kind: Some(kind.into()),
            ..PropertyDef::default()
        }
    }

    /// The identifier property every model carries.
    pub fn identifier() -> Self {
        PropertyDef {
            id: true,
            ..PropertyDef::new("String")
        }
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = Some(Searchable::Flag(true));
        self
    }

    pub fn ranked(mut self, rank: f64) -> Self {
        self.searchable = Some(Searchable::Rank(rank));
        self
    }

    pub fn facet(mut self, facet: Facet) -> Self {
        self.facet = Some(facet);
        self
    }

    pub fn retrievable(mut self) -> Self {
        self.retrievable = true;
        self
    }

    pub fn unretrievable(mut self) -> Self {
        self.unretrievable = true;
        self
    }

    /// Returns `true` if values are stored as epoch seconds in the index.
    pub fn is_timestamp(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("date"))
    }
}

/// Index-related settings of one model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub index_name: Option<String>,
    /// Index names the model may address. When empty, the keys of
    /// `indexes` and the connector's valid indexes apply.
    pub valid_indexes: Vec<String>,
    /// Secondary indexes and their settings.
    pub indexes: IndexMap<String, Document>,
    pub mapping: Option<FieldMapping>,
    /// Takes precedence over `mapping`.
    pub serialize_mapping: Option<FieldMapping>,
    pub normalize_mapping: Option<FieldMapping>,
    pub query_scope: Option<Filter>,
    /// Restricts which index settings may be written.
    pub valid_settings: Option<Vec<String>>,
    /// Property overrides that only apply to index settings.
    pub index_properties: IndexMap<String, PropertyDef>,
    pub batch_size: Option<usize>,
    pub defaults: Option<ValueSource>,
    pub attributes: Option<ValueSource>,
    #[serde(skip)]
    pub timestamp_hook: Option<TimestampHook>,
    /// Any other key is an index setting.
    #[serde(flatten)]
    pub index: Document,
}

impl ModelSettings {
    /// Returns the serialize mapping, preferring the explicit one.
    pub fn serialize_mapping(&self) -> Option<&FieldMapping> {
        self.serialize_mapping.as_ref().or(self.mapping.as_ref())
    }
}

/// A model as registered with the connector.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelDefinition {
    pub name: String,
    pub properties: IndexMap<String, PropertyDef>,
    /// Drop fields that are neither declared nor mapped.
    pub strict: bool,
    pub settings: ModelSettings,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDefinition {
            name: name.into(),
            ..ModelDefinition::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn property(mut self, name: impl Into<String>, def: PropertyDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn defaults(mut self, source: ValueSource) -> Self {
        self.settings.defaults = Some(source);
        self
    }

    pub fn attributes(mut self, source: ValueSource) -> Self {
        self.settings.attributes = Some(source);
        self
    }

    pub fn timestamp_hook(mut self, hook: TimestampHook) -> Self {
        self.settings.timestamp_hook = Some(hook);
        self
    }

    /// Names of the properties stored as timestamps.
    pub fn timestamp_fields(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, def)| def.is_timestamp())
            .map(|(name, _)| name.as_str())
    }
}
