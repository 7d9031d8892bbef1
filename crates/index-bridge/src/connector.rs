//! Model registry and entry points.
//!
//! A [`Connector`] holds the connector-wide settings and every registered
//! model. Registration resolves the model's mappings and builds its
//! [`Codec`] once; every entry point afterwards only reads.
//!
//! # Example
//!
//! ```
//! use index_bridge::{Connector, ConnectorSettings, Filter, ModelDefinition};
//! use serde_json::json;
//!
//! let mut connector = Connector::new(ConnectorSettings::default());
//! connector.define(ModelDefinition::from_json(r#"{
//!     "name": "Contact",
//!     "settings": { "mapping": { "tags": "_tags" } }
//! }"#).unwrap());
//!
//! let query = connector
//!     .build_query("Contact", &Filter::new().with_where(json!({ "tags": "vip" })))
//!     .unwrap();
//! assert_eq!(query.filters.as_deref(), Some(r#"_tags:"vip""#));
//! assert_eq!(connector.index_name("Contact", None).unwrap(), "contact");
//! ```

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::codec::{Codec, SerializeOptions};
use crate::error::{BridgeError, Result};
use crate::filter::Filter;
use crate::mapping::{ModelMapping, DOCUMENT_ID_FIELD, ID_FIELD};
use crate::path;
use crate::query::{self, BuildContext, QueryDescriptor, Selection};
use crate::schema::INDEX_SETTINGS;
use crate::settings::{ConnectorSettings, ModelDefinition, PropertyDef};
use crate::Document;

/// Write batch size used when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// How a bulk delete should be carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum DestroyPlan {
    /// Delete these identifiers directly.
    ByIds(Vec<Value>),
    /// Delete every document matching these search parameters.
    ByQuery(Map<String, Value>),
}

#[derive(Debug, Clone)]
struct RegisteredModel {
    definition: ModelDefinition,
    codec: Codec,
}

/// Connector-wide state and the model registry.
#[derive(Debug, Clone)]
pub struct Connector {
    settings: ConnectorSettings,
    mapping: ModelMapping,
    models: IndexMap<String, RegisteredModel>,
}

impl Connector {
    pub fn new(settings: ConnectorSettings) -> Self {
        let mapping = ModelMapping::resolve(
            settings.serialize_mapping(),
            settings.normalize_mapping.as_ref(),
        );
        Connector {
            settings,
            mapping,
            models: IndexMap::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Connector::new(ConnectorSettings::from_json(text)?))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(Connector::new(ConnectorSettings::from_yaml(text)?))
    }

    /// Registers a model, replacing any previous definition of that name.
    pub fn define(&mut self, mut definition: ModelDefinition) -> &Codec {
        definition
            .properties
            .entry(ID_FIELD.to_string())
            .or_insert_with(PropertyDef::identifier);

        let model = definition.settings.clone();
        let mapping = self
            .mapping
            .for_model(model.serialize_mapping(), model.normalize_mapping.as_ref());

        let mut codec = Codec::new(definition.name.clone(), mapping)
            .timestamps(definition.timestamp_fields().map(str::to_string).collect::<Vec<_>>());
        if definition.strict {
            codec = codec.strict(definition.properties.keys().cloned().collect::<Vec<_>>());
        }
        for source in [&self.settings.defaults, &model.defaults].into_iter().flatten() {
            codec = codec.defaults(source.clone());
        }
        for source in [&self.settings.attributes, &model.attributes].into_iter().flatten() {
            codec = codec.attributes(source.clone());
        }
        if let Some(hook) = model.timestamp_hook {
            codec = codec.timestamp_hook(hook);
        }

        debug!(
            model = %definition.name,
            properties = definition.properties.len(),
            strict = definition.strict,
            "registered model"
        );

        let name = definition.name.clone();
        self.models
            .insert(name.clone(), RegisteredModel { definition, codec });
        &self.models[name.as_str()].codec
    }

    /// Builder-style [`Connector::define`].
    pub fn with_model(mut self, definition: ModelDefinition) -> Self {
        self.define(definition);
        self
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Registered model names, in registration order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn definition(&self, model: &str) -> Result<&ModelDefinition> {
        self.registered(model).map(|entry| &entry.definition)
    }

    pub fn codec(&self, model: &str) -> Result<&Codec> {
        self.registered(model).map(|entry| &entry.codec)
    }

    /// Builds the search request for a model, folding in the connector
    /// scope and then the model scope.
    pub fn build_query(&self, model: &str, filter: &Filter) -> Result<QueryDescriptor> {
        let entry = self.registered(model)?;
        let mut ctx = BuildContext::new(&entry.codec.mapping().serialize);
        for scope in [&self.settings.query_scope, &entry.definition.settings.query_scope]
            .into_iter()
            .flatten()
        {
            ctx = ctx.scope(scope);
        }

        let descriptor = query::build_query(filter, &ctx);
        debug!(
            model,
            filters = descriptor.filters.as_deref().unwrap_or(""),
            "built query"
        );
        Ok(descriptor)
    }

    /// Compiles a `where` tree in the model's document field names.
    pub fn build_where(&self, model: &str, clause: &Value) -> Result<String> {
        let codec = self.codec(model)?;
        let filters = query::build_where(clause, &codec.mapping().serialize);
        debug!(model, filters = %filters, "compiled where");
        Ok(filters)
    }

    pub fn serialize_data(
        &self,
        model: &str,
        record: &Document,
        options: &SerializeOptions,
    ) -> Result<Document> {
        Ok(self.codec(model)?.serialize(record, options))
    }

    pub fn normalize_data(&self, model: &str, document: &Document) -> Result<Document> {
        Ok(self.codec(model)?.normalize(document))
    }

    /// Normalizes every hit of a search response.
    pub fn normalize_hits(&self, model: &str, hits: &[Document]) -> Result<Vec<Document>> {
        let codec = self.codec(model)?;
        Ok(hits.iter().map(|hit| codec.normalize(hit)).collect())
    }

    /// Derives the index settings of a model's primary index.
    ///
    /// Connector index settings are the base, model settings are merged on
    /// top. Attribute lists that are not set explicitly are derived from the
    /// property flags.
    pub fn model_index_settings(&self, model: &str) -> Result<Document> {
        let definition = self.definition(model)?;
        let mut settings = self.settings.index.clone();
        path::deep_merge(&mut settings, &definition.settings.index);
        settings.remove("indexName");

        let mut properties = definition.properties.clone();
        for (name, def) in &definition.settings.index_properties {
            properties.insert(name.clone(), def.clone());
        }

        if !is_array(&settings, "searchableAttributes") {
            let mut ranked: Vec<(&str, f64)> = properties
                .iter()
                .filter_map(|(name, def)| {
                    let rank = def.searchable.and_then(|searchable| searchable.rank())?;
                    Some((name.as_str(), rank))
                })
                .collect();
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
            settings.insert(
                "searchableAttributes".into(),
                string_array(ranked.into_iter().map(|(name, _)| name.to_string())),
            );
        }

        if !is_array(&settings, "attributesForFaceting") {
            let facets = properties
                .iter()
                .filter_map(|(name, def)| def.facet.and_then(|facet| facet.attribute(name)));
            settings.insert("attributesForFaceting".into(), string_array(facets));
        }

        if !is_array(&settings, "attributesToRetrieve") {
            let retrievable: Vec<String> = properties
                .iter()
                .filter(|(_, def)| def.retrievable)
                .map(|(name, _)| name.clone())
                .collect();
            if !retrievable.is_empty() {
                settings.insert("attributesToRetrieve".into(), string_array(retrievable));
            }
        }

        if !is_array(&settings, "unretrievableAttributes") {
            let unretrievable: Vec<String> = properties
                .iter()
                .filter(|(_, def)| def.unretrievable)
                .map(|(name, _)| name.clone())
                .collect();
            if !unretrievable.is_empty() {
                settings.insert("unretrievableAttributes".into(), string_array(unretrievable));
            }
        }

        Ok(settings)
    }

    /// Whitelists index settings before they are written.
    ///
    /// `valid` narrows the accepted keys for this call; the model's own
    /// `valid_settings` narrows them further.
    pub fn filter_index_settings(
        &self,
        model: &str,
        settings: &Value,
        valid: Option<&[String]>,
    ) -> Result<Document> {
        let definition = self.definition(model)?;
        let mut schema = INDEX_SETTINGS.clone();
        if let Some(valid) = valid {
            schema = schema.pick(valid);
        }
        if let Some(valid) = &definition.settings.valid_settings {
            schema = schema.pick(valid.as_slice());
        }
        Ok(schema.extract(settings))
    }

    /// Resolves the index a request goes to.
    ///
    /// The explicit name wins, then the model's index, then the
    /// connector's, then the snake_case model name.
    pub fn index_name(&self, model: &str, requested: Option<&str>) -> Result<String> {
        let entry = self.registered(model)?;
        let name = match requested {
            Some(name) => name.to_string(),
            None => self.primary_index(&entry.definition),
        };
        if self.valid_indexes(&entry.definition).contains(&name) {
            Ok(name)
        } else {
            warn!(model, index = %name, "rejected index name");
            Err(BridgeError::InvalidIndex {
                model: model.to_string(),
                index: name,
            })
        }
    }

    pub fn is_valid_index(&self, model: &str, index: &str) -> Result<bool> {
        let definition = self.definition(model)?;
        Ok(self.valid_indexes(definition).iter().any(|name| name == index))
    }

    /// Builds a delete request for a `where` tree.
    ///
    /// An identifier shortcut deletes by id. Anything else becomes a
    /// delete-by query, which is refused when it would match the whole
    /// index unless `force` is set.
    pub fn destroy_all_params(
        &self,
        model: &str,
        clause: &Value,
        force: bool,
    ) -> Result<DestroyPlan> {
        self.registered(model)?;
        if let Some(ids) = ids_from_where(clause) {
            return Ok(DestroyPlan::ByIds(ids));
        }

        let descriptor = self.build_query(model, &Filter::new().with_where(clause.clone()))?;
        let params = descriptor.to_params();
        if descriptor.query_text().is_empty() && params.is_empty() && !force {
            warn!(model, "refused unguarded delete");
            return Err(BridgeError::UnguardedDestroy {
                model: model.to_string(),
            });
        }
        Ok(DestroyPlan::ByQuery(params))
    }

    /// Serializes records into write batches.
    ///
    /// The batch size comes from the options, then the model, then the
    /// connector, then [`DEFAULT_BATCH_SIZE`]. A size of zero counts as
    /// unset.
    pub fn batches(
        &self,
        model: &str,
        records: &[Document],
        options: &SerializeOptions,
    ) -> Result<Vec<Vec<Document>>> {
        let entry = self.registered(model)?;
        let size = [
            options.batch_size,
            entry.definition.settings.batch_size,
            self.settings.batch_size,
        ]
        .into_iter()
        .flatten()
        .find(|size| *size > 0)
        .unwrap_or(DEFAULT_BATCH_SIZE);

        let documents: Vec<Document> = records
            .iter()
            .map(|record| entry.codec.serialize(record, options))
            .collect();
        if documents.is_empty() {
            return Ok(vec![documents]);
        }
        Ok(documents.chunks(size).map(<[Document]>::to_vec).collect())
    }

    /// Builds a search request that only asks for the hit count.
    pub fn count_query(&self, model: &str, clause: &Value) -> Result<QueryDescriptor> {
        let filter = Filter::new().with_where(clause.clone()).limit(1);
        let mut descriptor = self.build_query(model, &filter)?;
        descriptor.attributes_to_retrieve = Some(Vec::new());
        descriptor.attributes_to_highlight = Some(Selection::Fields(Vec::new()));
        descriptor.attributes_to_snippet = Some(Selection::Fields(Vec::new()));
        Ok(descriptor)
    }

    /// Serializes a new record for insertion.
    ///
    /// An identifier that is neither a non-empty string nor a number is
    /// dropped so the index assigns one.
    pub fn create_document(
        &self,
        model: &str,
        record: &Document,
        options: &SerializeOptions,
    ) -> Result<Document> {
        let mut document = self.serialize_data(model, record, options)?;
        if document.is_empty() {
            return Err(BridgeError::EmptyRecord {
                model: model.to_string(),
            });
        }
        let valid_id = match document.get(DOCUMENT_ID_FIELD) {
            Some(Value::String(id)) => !id.is_empty(),
            Some(Value::Number(_)) => true,
            _ => false,
        };
        if !valid_id {
            document.remove(DOCUMENT_ID_FIELD);
        }
        Ok(document)
    }

    /// Serializes a partial update for an existing record.
    ///
    /// Defaults are skipped unless the options turn them on. The identifier
    /// is always written as a string.
    pub fn update_document(
        &self,
        model: &str,
        id: &Value,
        record: &Document,
        options: &SerializeOptions,
    ) -> Result<Document> {
        let options = options
            .clone()
            .serialize_defaults(options.defaults_enabled(false));
        let mut document = self.serialize_data(model, record, &options)?;
        let id = match id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        document.insert(DOCUMENT_ID_FIELD.into(), Value::String(id));
        Ok(document)
    }

    /// Lists every index a model owns with the settings it should carry.
    ///
    /// Secondary indexes keep their declared settings; the primary index
    /// gets the derived model settings.
    pub fn index_plan(&self, model: &str) -> Result<IndexMap<String, Document>> {
        let definition = self.definition(model)?;
        let mut plan = definition.settings.indexes.clone();
        let primary = self.index_name(model, None)?;
        plan.insert(primary, self.model_index_settings(model)?);
        Ok(plan)
    }

    fn registered(&self, model: &str) -> Result<&RegisteredModel> {
        self.models.get(model).ok_or_else(|| BridgeError::UnknownModel {
            model: model.to_string(),
        })
    }

    fn primary_index(&self, definition: &ModelDefinition) -> String {
        definition
            .settings
            .index_name
            .clone()
            .or_else(|| self.settings.index_name.clone())
            .unwrap_or_else(|| definition.name.to_case(Case::Snake))
    }

    fn valid_indexes(&self, definition: &ModelDefinition) -> Vec<String> {
        let settings = &definition.settings;
        let mut valid = settings.valid_indexes.clone();
        valid.push(self.primary_index(definition));
        if settings.valid_indexes.is_empty() {
            valid.extend(settings.indexes.keys().cloned());
            valid.extend(self.settings.valid_indexes.iter().cloned());
        }
        valid
    }
}

/// Recognizes a `where` tree that only selects by identifier.
///
/// `{id: x}`, `{id: [..]}` and `{id: {inq: [..]}}` qualify when `id` is the
/// only key.
pub fn ids_from_where(clause: &Value) -> Option<Vec<Value>> {
    let map = clause.as_object()?;
    if map.len() != 1 {
        return None;
    }
    match map.get(ID_FIELD)? {
        Value::Object(id) => match id.get("inq") {
            Some(Value::Array(ids)) if id.len() == 1 => Some(ids.clone()),
            _ => None,
        },
        Value::Array(ids) => Some(ids.clone()),
        id @ (Value::String(_) | Value::Number(_)) => Some(vec![id.clone()]),
        _ => None,
    }
}

fn is_array(settings: &Document, key: &str) -> bool {
    settings.get(key).is_some_and(Value::is_array)
}

fn string_array<I: IntoIterator<Item = String>>(items: I) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}
