//! Query building.
//!
//! [`build_query`] turns a [`Filter`] into a [`QueryDescriptor`]: the
//! free-text query plus the parameter map a search request carries.
//!
//! The steps run in a fixed order and later steps never override what an
//! earlier step decided:
//!
//! 1. the free-text query is copied through;
//! 2. scopes are folded in and the `where` tree is translated and compiled,
//!    or a raw filter expression is taken verbatim;
//! 3. `limit`/`offset`/`skip` become `hitsPerPage` and a page index;
//! 4. the field projection becomes `attributesToRetrieve`;
//! 5. remaining parameters are whitelisted against the query schema;
//! 6. `facets`, `attributesToHighlight` and `attributesToSnippet` accept the
//!    `"*"` wildcard.
//!
//! # Example
//!
//! ```
//! use index_bridge::{build_query, BuildContext, FieldMapping, Filter};
//! use serde_json::json;
//!
//! let mapping = FieldMapping::new().with("id", "objectID");
//! let filter = Filter::new()
//!     .with_where(json!({ "state": "OR" }))
//!     .limit(5)
//!     .offset(10);
//!
//! let query = build_query(&filter, &BuildContext::new(&mapping));
//!
//! assert_eq!(query.filters.as_deref(), Some(r#"state:"OR""#));
//! assert_eq!(query.page, Some(2));
//! assert_eq!(query.hits_per_page, Some(5));
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::compile::compile;
use crate::filter::Filter;
use crate::mapping::{FieldMapping, DOCUMENT_ID_FIELD};
use crate::schema::{ParamSchema, QUERY_SETTINGS};
use crate::scope::{merge, MergeOptions};

/// Literal that selects every attribute.
pub const WILDCARD: &str = "*";

/// An attribute list that may also be the `"*"` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Fields(Vec<String>),
}

impl Selection {
    /// Reads a selection from a raw parameter value.
    pub fn from_value(value: &Value) -> Option<Selection> {
        match value {
            Value::String(text) if text == WILDCARD => Some(Selection::All),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Selection::Fields),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Selection::All => Value::String(WILDCARD.to_string()),
            Selection::Fields(fields) => {
                Value::Array(fields.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selection::All => serializer.serialize_str(WILDCARD),
            Selection::Fields(fields) => fields.serialize(serializer),
        }
    }
}

/// A compiled search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_highlight: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_to_snippet: Option<Selection>,
    /// Every other whitelisted parameter.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl QueryDescriptor {
    /// Renders the parameter map sent alongside the free-text query.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(filters) = &self.filters {
            params.insert("filters".into(), Value::String(filters.clone()));
        }
        if let Some(page) = self.page {
            params.insert("page".into(), Value::from(page));
        }
        if let Some(hits) = self.hits_per_page {
            params.insert("hitsPerPage".into(), Value::from(hits));
        }
        if let Some(attributes) = &self.attributes_to_retrieve {
            params.insert(
                "attributesToRetrieve".into(),
                Value::Array(attributes.iter().cloned().map(Value::String).collect()),
            );
        }
        for (key, selection) in [
            ("facets", &self.facets),
            ("attributesToHighlight", &self.attributes_to_highlight),
            ("attributesToSnippet", &self.attributes_to_snippet),
        ] {
            if let Some(selection) = selection {
                params.insert(key.into(), selection.to_value());
            }
        }
        for (key, value) in &self.params {
            params.entry(key.clone()).or_insert_with(|| value.clone());
        }
        params
    }

    /// Returns the free-text query, empty when none was given.
    pub fn query_text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// Inputs for [`build_query`] besides the filter itself.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// Record to document field mapping used for field names.
    pub mapping: &'a FieldMapping,
    /// Scopes folded into the request, outermost first.
    pub scopes: Vec<&'a Filter>,
    /// Whitelist for extra parameters.
    pub schema: &'a ParamSchema,
}

impl<'a> BuildContext<'a> {
    /// Creates a context with no scopes and the built-in query schema.
    pub fn new(mapping: &'a FieldMapping) -> Self {
        BuildContext {
            mapping,
            scopes: Vec::new(),
            schema: &QUERY_SETTINGS,
        }
    }

    /// Appends a scope. Scopes apply in the order they are added.
    pub fn scope(mut self, scope: &'a Filter) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn schema(mut self, schema: &'a ParamSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// Translates field names of a `where` tree and compiles it.
pub fn build_where(clause: &Value, mapping: &FieldMapping) -> String {
    match clause {
        Value::Object(map) if !map.is_empty() => compile(&mapping.translate_where(clause)),
        _ => String::new(),
    }
}

/// Builds the search request for `filter`.
pub fn build_query(filter: &Filter, ctx: &BuildContext<'_>) -> QueryDescriptor {
    let raw_only = filter.structured_where().is_none() && filter.raw_filters().is_some();
    let mut working = filter.clone();
    for scope in &ctx.scopes {
        let mut scope = (*scope).clone();
        if raw_only {
            scope.where_ = None;
        }
        fill_unset(&mut working, &mut scope);
        merge(&mut working, &scope, &MergeOptions::where_only());
    }

    let mut descriptor = QueryDescriptor {
        query: working.query.clone(),
        ..QueryDescriptor::default()
    };

    if let Some(clause) = working.structured_where() {
        let filters = build_where(&Value::Object(clause.clone()), ctx.mapping);
        if !filters.is_empty() {
            descriptor.filters = Some(filters);
        }
    } else if let Some(raw) = working.raw_filters() {
        descriptor.filters = Some(raw.to_string());
    }

    let paginated = apply_pagination(&mut descriptor, &working);

    if let Some(fields) = working.fields.as_ref().filter(|fields| !fields.is_empty()) {
        let attributes = fields
            .iter()
            .map(|field| ctx.mapping.rename(field).to_string())
            .filter(|attribute| attribute != DOCUMENT_ID_FIELD)
            .collect();
        descriptor.attributes_to_retrieve = Some(attributes);
    }

    let mut source = working.params.clone();
    if !paginated {
        if let Some(offset) = working.offset {
            source.insert("offset".into(), Value::from(offset));
        }
    }
    apply_extracted(&mut descriptor, ctx.schema.extract(&Value::Object(source)));

    for (key, slot) in [
        ("facets", &mut descriptor.facets),
        ("attributesToHighlight", &mut descriptor.attributes_to_highlight),
        ("attributesToSnippet", &mut descriptor.attributes_to_snippet),
    ] {
        if working.params.get(key).and_then(Value::as_str) == Some(WILDCARD) {
            *slot = Some(Selection::All);
        }
    }

    descriptor
}

/// Copies a scope's projection and pagination into the request only where
/// the caller left them unset.
fn fill_unset(working: &mut Filter, scope: &mut Filter) {
    if working.fields.is_some() {
        scope.fields = None;
    }
    if working.limit.is_none() {
        working.limit = scope.limit;
    }
    if working.page.is_none() && working.offset.is_none() && working.skip.is_none() {
        working.page = scope.page;
        working.offset = scope.offset;
        working.skip = scope.skip;
    }
}

/// Sets `page`/`hitsPerPage`. Returns `true` when the pagination keys were
/// consumed.
fn apply_pagination(descriptor: &mut QueryDescriptor, filter: &Filter) -> bool {
    if let Some(page) = filter.page {
        descriptor.page = Some(page);
        descriptor.hits_per_page = filter.limit;
        return true;
    }

    let Some(limit) = filter.limit else {
        return false;
    };
    if limit == 0 {
        return true;
    }
    descriptor.hits_per_page = Some(limit);
    let offset = filter
        .offset
        .filter(|offset| *offset > 0)
        .or(filter.skip.filter(|skip| *skip > 0))
        .unwrap_or(0);
    let page = offset / limit;
    if page > 0 {
        descriptor.page = Some(page);
    }
    true
}

fn apply_extracted(descriptor: &mut QueryDescriptor, extracted: Map<String, Value>) {
    for (key, value) in extracted {
        match key.as_str() {
            "filters" => {
                if descriptor.filters.is_none() {
                    descriptor.filters = value.as_str().map(str::to_string);
                }
            }
            "page" => {
                if descriptor.page.is_none() {
                    descriptor.page = value.as_u64();
                }
            }
            "hitsPerPage" => {
                if descriptor.hits_per_page.is_none() {
                    descriptor.hits_per_page = value.as_u64();
                }
            }
            "attributesToRetrieve" => {
                if descriptor.attributes_to_retrieve.is_none() {
                    descriptor.attributes_to_retrieve = string_list(&value);
                }
            }
            "facets" => fill_selection(&mut descriptor.facets, &value),
            "attributesToHighlight" => {
                fill_selection(&mut descriptor.attributes_to_highlight, &value)
            }
            "attributesToSnippet" => fill_selection(&mut descriptor.attributes_to_snippet, &value),
            _ => {
                descriptor.params.entry(key).or_insert(value);
            }
        }
    }
}

fn fill_selection(slot: &mut Option<Selection>, value: &Value) {
    if slot.is_none() {
        *slot = Selection::from_value(value);
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> FieldMapping {
        FieldMapping::new()
            .with("id", "objectID")
            .with("tags", "_tags")
    }

    fn build(filter: Filter) -> QueryDescriptor {
        let mapping = mapping();
        build_query(&filter, &BuildContext::new(&mapping))
    }

    #[test]
    fn copies_query_and_compiles_where() {
        let query = build(
            Filter::new()
                .query("john")
                .with_where(json!({ "id": 1234, "tags": "vip" })),
        );
        assert_eq!(query.query.as_deref(), Some("john"));
        assert_eq!(query.filters.as_deref(), Some(r#"objectID:1234 AND _tags:"vip""#));
    }

    #[test]
    fn empty_where_sets_no_filters() {
        let query = build(Filter::new().with_where(json!({ "name": { "like": "x" } })));
        assert_eq!(query.filters, None);
    }

    #[test]
    fn raw_filters_used_verbatim() {
        let query = build(Filter::new().filters("state:OR"));
        assert_eq!(query.filters.as_deref(), Some("state:OR"));

        let query = build(
            Filter::new()
                .filters("state:OR")
                .with_where(json!({ "city": "Salem" })),
        );
        assert_eq!(query.filters.as_deref(), Some(r#"city:"Salem""#));
    }

    #[test]
    fn pagination_from_offset_and_limit() {
        let cases = [
            (4, 5, None),
            (5, 5, Some(1)),
            (7, 5, Some(1)),
            (10, 5, Some(2)),
            (14, 5, Some(2)),
            (15, 5, Some(3)),
        ];
        for (offset, limit, page) in cases {
            let query = build(Filter::new().offset(offset).limit(limit));
            assert_eq!(query.hits_per_page, Some(limit));
            assert_eq!(query.page, page, "offset {offset} limit {limit}");
            assert!(!query.params.contains_key("offset"));
        }
    }

    #[test]
    fn skip_used_when_offset_missing() {
        let query = build(Filter::new().skip(10).limit(5));
        assert_eq!(query.page, Some(2));
    }

    #[test]
    fn explicit_page_wins() {
        let query = build(Filter::new().page(2).limit(5).offset(40));
        assert_eq!(query.page, Some(2));
        assert_eq!(query.hits_per_page, Some(5));
        assert!(!query.params.contains_key("offset"));
    }

    #[test]
    fn zero_limit_sends_no_pagination() {
        let query = build(Filter::new().offset(10).limit(0));
        assert_eq!(query.page, None);
        assert_eq!(query.hits_per_page, None);
        assert!(!query.params.contains_key("offset"));
    }

    #[test]
    fn fields_are_mapped_and_strip_identifier() {
        let query = build(Filter::new().fields(["id", "name", "tags"]));
        assert_eq!(
            query.attributes_to_retrieve,
            Some(vec!["name".to_string(), "_tags".to_string()])
        );
    }

    #[test]
    fn extra_params_are_whitelisted() {
        let query = build(
            Filter::new()
                .param("restrictSearchableAttributes", json!(["firstname"]))
                .param("typoTolerance", "min")
                .param("facets", json!(["state"]))
                .param("attributesToHighlight", "invalid")
                .param("unknown", "invalid"),
        );

        assert_eq!(query.facets, Some(Selection::Fields(vec!["state".into()])));
        assert_eq!(query.attributes_to_highlight, None);
        assert_eq!(
            Value::Object(query.params),
            json!({ "restrictSearchableAttributes": ["firstname"], "typoTolerance": "min" })
        );
    }

    #[test]
    fn extracted_params_do_not_override_earlier_steps() {
        let query = build(
            Filter::new()
                .limit(5)
                .fields(["name"])
                .param("hitsPerPage", 50)
                .param("attributesToRetrieve", json!(["objectID"])),
        );
        assert_eq!(query.hits_per_page, Some(5));
        assert_eq!(query.attributes_to_retrieve, Some(vec!["name".to_string()]));
    }

    #[test]
    fn offset_without_limit_passes_through() {
        let query = build(Filter::new().offset(20).param("length", 10));
        assert_eq!(query.page, None);
        assert_eq!(query.params.get("offset"), Some(&json!(20)));
        assert_eq!(query.params.get("length"), Some(&json!(10)));
    }

    #[test]
    fn wildcards_are_forced() {
        let query = build(
            Filter::new()
                .param("facets", "*")
                .param("attributesToHighlight", "*")
                .param("attributesToSnippet", "*"),
        );
        assert_eq!(query.facets, Some(Selection::All));
        assert_eq!(query.attributes_to_highlight, Some(Selection::All));
        assert_eq!(query.attributes_to_snippet, Some(Selection::All));
        assert_eq!(query.to_params().get("facets"), Some(&json!("*")));
    }

    #[test]
    fn scopes_are_anded_onto_where() {
        let mapping = mapping();
        let connector_scope = Filter::new().with_where(json!({ "tenant": "acme" }));
        let model_scope = Filter::new().with_where(json!({ "active": true })).limit(20);
        let ctx = BuildContext::new(&mapping)
            .scope(&connector_scope)
            .scope(&model_scope);

        let query = build_query(&Filter::new().with_where(json!({ "state": "OR" })), &ctx);
        assert_eq!(
            query.filters.as_deref(),
            Some(r#"state:"OR" AND tenant:"acme" AND active:true"#)
        );
        assert_eq!(query.hits_per_page, Some(20));
    }

    #[test]
    fn caller_pagination_wins_over_scope() {
        let mapping = mapping();
        let scope = Filter::new()
            .with_where(json!({ "active": true }))
            .limit(20)
            .offset(0)
            .fields(["name"]);
        let ctx = BuildContext::new(&mapping).scope(&scope);

        let query = build_query(
            &Filter::new().limit(5).offset(10).fields(["tags"]),
            &ctx,
        );
        assert_eq!(query.filters.as_deref(), Some("active:true"));
        assert_eq!(query.hits_per_page, Some(5));
        assert_eq!(query.page, Some(2));
        assert_eq!(query.attributes_to_retrieve, Some(vec!["_tags".to_string()]));
    }

    #[test]
    fn scope_offset_fills_only_when_caller_has_none() {
        let mapping = mapping();
        let scope = Filter::new().offset(10);
        let ctx = BuildContext::new(&mapping).scope(&scope);

        let query = build_query(&Filter::new().limit(5), &ctx);
        assert_eq!(query.page, Some(2));

        let query = build_query(&Filter::new().limit(5).skip(5), &ctx);
        assert_eq!(query.page, Some(1));
    }

    #[test]
    fn scope_where_applies_without_caller_where() {
        let mapping = mapping();
        let scope = Filter::new().with_where(json!({ "active": true }));
        let ctx = BuildContext::new(&mapping).scope(&scope);
        let query = build_query(&Filter::new(), &ctx);
        assert_eq!(query.filters.as_deref(), Some("active:true"));
    }

    #[test]
    fn raw_filters_skip_scope_where() {
        let mapping = mapping();
        let scope = Filter::new().with_where(json!({ "active": true })).limit(3);
        let ctx = BuildContext::new(&mapping).scope(&scope);
        let query = build_query(&Filter::new().filters("state:OR"), &ctx);
        assert_eq!(query.filters.as_deref(), Some("state:OR"));
        assert_eq!(query.hits_per_page, Some(3));
    }

    #[test]
    fn to_params_omits_query_text() {
        let query = build(Filter::new().query("john").limit(5).offset(5));
        let params = query.to_params();
        assert_eq!(Value::Object(params), json!({ "page": 1, "hitsPerPage": 5 }));
        assert_eq!(query.query_text(), "john");
    }

    #[test]
    fn serializes_in_camel_case() {
        let query = build(Filter::new().limit(5).fields(["name"]));
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({ "hitsPerPage": 5, "attributesToRetrieve": ["name"] })
        );
    }

    #[test]
    fn build_where_translates_and_compiles() {
        assert_eq!(
            build_where(&json!({ "id": { "inq": ["a", "b"] } }), &mapping()),
            r#"(objectID:"a" OR objectID:"b")"#
        );
        assert_eq!(build_where(&json!({}), &mapping()), "");
        assert_eq!(build_where(&json!(null), &mapping()), "");
    }
}
