//! Typed parameter schemas and whitelisting.
//!
//! A [`ParamSchema`] maps dotted paths to [`TypeExpr`]s. Extraction keeps
//! only the declared paths whose values satisfy their type, which is how
//! caller-supplied query parameters and index settings are sanitized before
//! they reach the remote index.
//!
//! # Example
//!
//! ```
//! use index_bridge::ParamSchema;
//! use serde_json::json;
//!
//! let schema = ParamSchema::new()
//!     .with("hitsPerPage", "Number")
//!     .with("typoTolerance", "Boolean|String");
//!
//! let extracted = schema.extract(&json!({
//!     "hitsPerPage": "ten",
//!     "typoTolerance": "min",
//!     "unknown": true
//! }));
//!
//! assert_eq!(serde_json::Value::Object(extracted), json!({ "typoTolerance": "min" }));
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::path;
use crate::type_expr::TypeExpr;

/// Ordered mapping of dotted path to the type its value must satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    entries: IndexMap<String, TypeExpr>,
}

impl ParamSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        ParamSchema::default()
    }

    /// Adds a path with its type expression.
    pub fn with(mut self, path: impl Into<String>, expr: &str) -> Self {
        self.insert(path, expr);
        self
    }

    /// Adds or replaces a path with its type expression.
    pub fn insert(&mut self, path: impl Into<String>, expr: &str) {
        self.entries.insert(path.into(), TypeExpr::parse(expr));
    }

    /// Returns a schema that contains the entries of both, `other` winning.
    pub fn merged(&self, other: &ParamSchema) -> ParamSchema {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.clone());
        ParamSchema { entries }
    }

    /// Restricts the schema to the given names, keeping declaration order.
    pub fn pick<S: AsRef<str>>(&self, names: &[S]) -> ParamSchema {
        let entries = self
            .entries
            .iter()
            .filter(|(path, _)| names.iter().any(|name| name.as_ref() == path.as_str()))
            .map(|(path, expr)| (path.clone(), expr.clone()))
            .collect();
        ParamSchema { entries }
    }

    /// Returns the type expression declared for a path.
    pub fn get(&self, path: &str) -> Option<&TypeExpr> {
        self.entries.get(path)
    }

    /// Returns `true` if the path is declared.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns the declared paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of declared paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no path is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extracts the declared, type-valid paths of `source`.
    ///
    /// Absent paths and values failing their type are omitted. Non-object
    /// sources yield an empty result.
    pub fn extract(&self, source: &Value) -> Map<String, Value> {
        let mut extracted = Map::new();
        for (key, expr) in &self.entries {
            if let Some(value) = path::get(source, key) {
                if expr.matches(value) {
                    path::set(&mut extracted, key, value.clone());
                }
            }
        }
        extracted
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ParamSchema {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut schema = ParamSchema::new();
        for (path, expr) in iter {
            schema.insert(path, expr);
        }
        schema
    }
}

const COMMON_SETTINGS: &[(&str, &str)] = &[
    ("attributesToRetrieve", "[String]"),
    ("maxValuesPerFacet", "Number"),
    ("attributesToHighlight", "[String]"),
    ("attributesToSnippet", "[String]"),
    ("highlightPreTag", "String"),
    ("highlightPostTag", "String"),
    ("snippetEllipsisText", "String"),
    ("restrictHighlightAndSnippetArrays", "Boolean"),
    ("hitsPerPage", "Number"),
    ("minWordSizefor1Typo", "Number"),
    ("minWordSizefor2Typos", "Number"),
    ("typoTolerance", "Boolean|String"),
    ("allowTyposOnNumericTokens", "Boolean"),
    ("ignorePlurals", "Boolean|String"),
    ("disableTypoToleranceOnAttributes", "[String]"),
    ("queryType", "String"),
    ("removeWordsIfNoResults", "String"),
    ("advancedSyntax", "Boolean"),
    ("optionalWords", "[String]|String"),
    ("removeStopWords", "[String]|Boolean"),
    ("disableExactOnAttributes", "[String]"),
    ("exactOnSingleWordQuery", "String"),
    ("alternativesAsExact", "[String]"),
    ("distinct", "Number|Boolean"),
    ("replaceSynonymsInHighlight", "Boolean"),
    ("minProximity", "Number"),
    ("responseFields", "[String]"),
    ("maxFacetHits", "Number"),
];

const QUERY_ONLY_SETTINGS: &[(&str, &str)] = &[
    ("restrictSearchableAttributes", "[String]"),
    ("filters", "String"),
    ("facets", "[String]"),
    ("facetingAfterDistinct", "Boolean"),
    ("facetFilters", "Array"),
    ("page", "Number"),
    ("offset", "Number"),
    ("length", "Number"),
    ("aroundLatLng", "String"),
    ("aroundLatLngViaIP", "Boolean"),
    ("aroundRadius", "Number|String"),
    ("aroundPrecision", "Number"),
    ("minimumAroundRadius", "Number"),
    ("insideBoundingBox", "*"),
    ("insidePolygon", "*"),
    ("getRankingInfo", "Boolean"),
    ("numericFilters", "[String]"),
    ("tagFilters", "[String]"),
    ("analytics", "Boolean"),
    ("analyticsTags", "[String]"),
    ("synonyms", "Boolean"),
];

const INDEX_ONLY_SETTINGS: &[(&str, &str)] = &[
    ("searchableAttributes", "[String]"),
    ("attributesForFaceting", "[String]"),
    ("unretrievableAttributes", "[String]"),
    ("ranking", "[String]"),
    ("customRanking", "[String]"),
    ("replicas", "[String]"),
    ("paginationLimitedTo", "Number"),
    ("disableTypoToleranceOnWords", "[String]"),
    ("separatorsToIndex", "String"),
    ("disablePrefixOnAttributes", "[String]"),
    ("numericAttributesForFiltering", "[String]"),
    ("allowCompressionOfIntegerArray", "Boolean"),
    ("attributeForDistinct", "String"),
    ("placeholders", "Object"),
];

/// Parameters accepted on a search request.
pub static QUERY_SETTINGS: Lazy<ParamSchema> = Lazy::new(|| {
    QUERY_ONLY_SETTINGS
        .iter()
        .chain(COMMON_SETTINGS)
        .copied()
        .collect()
});

/// Settings accepted when configuring an index.
pub static INDEX_SETTINGS: Lazy<ParamSchema> = Lazy::new(|| {
    INDEX_ONLY_SETTINGS
        .iter()
        .chain(COMMON_SETTINGS)
        .copied()
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_keeps_valid_paths_only() {
        let schema = ParamSchema::new()
            .with("facets", "[String]")
            .with("typoTolerance", "Boolean|String")
            .with("hitsPerPage", "Number");

        let extracted = schema.extract(&json!({
            "facets": ["state"],
            "typoTolerance": "min",
            "hitsPerPage": "many",
            "unknown": "invalid"
        }));

        assert_eq!(
            Value::Object(extracted),
            json!({ "facets": ["state"], "typoTolerance": "min" })
        );
    }

    #[test]
    fn extract_preserves_nested_paths() {
        let schema = ParamSchema::new()
            .with("geo.lat", "Number")
            .with("geo.lng", "Number")
            .with("geo.label", "String");

        let extracted = schema.extract(&json!({
            "geo": { "lat": 45.5, "lng": "west", "extra": 1 }
        }));

        assert_eq!(Value::Object(extracted), json!({ "geo": { "lat": 45.5 } }));
    }

    #[test]
    fn extract_from_non_object_is_empty() {
        let schema = ParamSchema::new().with("a", "*");
        assert!(schema.extract(&json!("scalar")).is_empty());
        assert!(schema.extract(&Value::Null).is_empty());
    }

    #[test]
    fn explicit_null_only_passes_permissive_types() {
        let schema = ParamSchema::new().with("a", "*").with("b", "String");
        let extracted = schema.extract(&json!({ "a": null, "b": null }));
        assert_eq!(Value::Object(extracted), json!({ "a": null }));
    }

    #[test]
    fn pick_restricts_in_declaration_order() {
        let picked = INDEX_SETTINGS.pick(&["hitsPerPage", "searchableAttributes", "nope"]);
        assert_eq!(
            picked.paths().collect::<Vec<_>>(),
            vec!["searchableAttributes", "hitsPerPage"]
        );
    }

    #[test]
    fn merged_prefers_other() {
        let base = ParamSchema::new().with("a", "String").with("b", "Number");
        let other = ParamSchema::new().with("a", "Number");
        let merged = base.merged(&other);
        assert_eq!(merged.get("a"), Some(&TypeExpr::parse("Number")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn builtin_schemas_share_common_settings() {
        for path in ["hitsPerPage", "attributesToRetrieve", "distinct"] {
            assert!(QUERY_SETTINGS.contains(path));
            assert!(INDEX_SETTINGS.contains(path));
        }
        assert!(QUERY_SETTINGS.contains("facets"));
        assert!(!INDEX_SETTINGS.contains("facets"));
        assert!(INDEX_SETTINGS.contains("customRanking"));
        assert!(!QUERY_SETTINGS.contains("customRanking"));
    }

    #[test]
    fn builtin_query_schema_filters_request() {
        let extracted = QUERY_SETTINGS.extract(&json!({
            "restrictSearchableAttributes": ["firstname"],
            "typoTolerance": "min",
            "facets": ["state"],
            "attributesToHighlight": "invalid",
            "unknown": "invalid"
        }));
        assert_eq!(
            Value::Object(extracted),
            json!({
                "restrictSearchableAttributes": ["firstname"],
                "facets": ["state"],
                "typoTolerance": "min"
            })
        );
    }
}
