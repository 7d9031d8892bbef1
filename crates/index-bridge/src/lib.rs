//! Index Bridge - filter compilation and record mapping for hosted search
//! indexes.
//!
//! Index Bridge sits between an application's data models and a hosted
//! full-text search index. It is pure and synchronous: it builds the
//! requests and documents, a client of your choice sends them. It covers:
//!
//! - Compiling structured `where` trees into filter expressions
//! - Building search requests from filters, scopes and pagination
//! - Whitelisting query parameters and index settings by type
//! - Converting records to index documents and back
//! - Deriving index settings from declared model properties
//!
//! # Quick Start
//!
//! ```rust
//! use index_bridge::{Connector, Filter, SerializeOptions};
//! use serde_json::json;
//!
//! let connector = Connector::from_yaml(r#"
//! indexName: dev_contacts
//! mapping: { tags: _tags }
//! "#)
//! .unwrap()
//! .with_model(index_bridge::ModelDefinition::from_yaml(r#"
//! name: Contact
//! strict: true
//! properties:
//!   firstname: { type: String, searchable: 1 }
//!   state: { type: String, facet: true }
//!   followers: { type: Number }
//!   registeredAt: { type: Date }
//!   tags: { type: "[String]" }
//! "#).unwrap());
//!
//! // Search requests
//! let filter = Filter::new()
//!     .with_where(json!({ "state": "OR", "followers": { "gt": 1000 } }))
//!     .limit(10)
//!     .offset(20);
//! let query = connector.build_query("Contact", &filter).unwrap();
//! assert_eq!(query.filters.as_deref(), Some(r#"state:"OR" AND followers > 1000"#));
//! assert_eq!(query.page, Some(2));
//!
//! // Records become documents
//! let record = json!({ "id": "c-1", "tags": ["vip"], "registeredAt": "2017-03-24", "x": 1 });
//! let document = connector
//!     .serialize_data("Contact", record.as_object().unwrap(), &SerializeOptions::default())
//!     .unwrap();
//! assert_eq!(
//!     serde_json::Value::Object(document),
//!     json!({ "objectID": "c-1", "_tags": ["vip"], "registeredAt": 1490313600 })
//! );
//! ```
//!
//! # Predicate Grammar
//!
//! A `where` tree is a JSON object. Plain keys are field names, reserved
//! keys are operators:
//!
//! | Operator | Renders as |
//! |----------|------------|
//! | `and`, `or` | sub-clauses joined with ` AND ` / ` OR ` |
//! | `gt`, `gte`, `lt`, `lte` | `field > value` |
//! | `between` | `field:lo TO hi` |
//! | `inq`, `nin` | `(field:a OR field:b)`, negated for `nin` |
//! | `neq` | `NOT field:value` |
//! | `near`, `like`, `nlike` | accepted, dropped |
//!
//! Malformed fragments compile to nothing instead of failing the request.

mod codec;
mod compile;
mod connector;
mod date;
mod error;
mod filter;
mod mapping;
mod op;
mod path;
mod predicate;
mod query;
mod schema;
mod scope;
mod settings;
mod type_expr;

/// A flat JSON object: a record or an index document.
pub type Document = serde_json::Map<String, serde_json::Value>;

// Re-export public API
pub use codec::{Codec, Direction, SerializeOptions, SourceContext, TimestampHook, ValueSource};
pub use compile::compile;
pub use connector::{ids_from_where, Connector, DestroyPlan, DEFAULT_BATCH_SIZE};
pub use convert_case::Case;
pub use error::{BridgeError, Result};
pub use filter::Filter;
pub use mapping::{
    convert_key_case, format_keys, object_id, FieldMapping, ModelMapping, DOCUMENT_ID_FIELD,
    ID_FIELD,
};
pub use op::Op;
pub use predicate::{Comparator, Logic, Predicate};
pub use query::{build_query, build_where, BuildContext, QueryDescriptor, Selection, WILDCARD};
pub use schema::{ParamSchema, INDEX_SETTINGS, QUERY_SETTINGS};
pub use scope::{merge, merge_includes, MergeOptions};
pub use settings::{
    ConnectorSettings, Facet, FacetMode, ModelDefinition, ModelSettings, PropertyDef, Searchable,
};
pub use type_expr::{matches as type_matches, Kind, TypeExpr};
