//! Scenario tests against a contacts model.

use index_bridge::{
    merge, BridgeError, Connector, ConnectorSettings, DestroyPlan, Direction, Document, Filter,
    MergeOptions, ModelDefinition, Predicate, QueryDescriptor, Selection, SerializeOptions,
    TimestampHook, ValueSource,
};
use serde_json::{json, Value};

const CONNECTOR: &str = include_str!("fixtures/connector.yaml");
const CONTACT: &str = include_str!("fixtures/contact.yaml");

fn connector() -> Connector {
    Connector::from_yaml(CONNECTOR)
        .unwrap()
        .with_model(ModelDefinition::from_yaml(CONTACT).unwrap())
}

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn query(filter: Value) -> Value {
    let filter = Filter::from_value(filter).unwrap();
    let descriptor = connector().build_query("Contact", &filter).unwrap();
    serde_json::to_value(descriptor).unwrap()
}

fn contact_data() -> Value {
    json!({
        "firstname": "Fabien",
        "lastname": "Franzen",
        "company": "Atelier Fabien",
        "city": "Portland",
        "state": "OR",
        "followers": 1327,
        "registeredAt": "2017-03-24T00:00:00Z",
        "tags": ["foo", "bar", "baz"]
    })
}

// ============================================================================
// Query building
// ============================================================================

#[test]
fn empty_filter_builds_empty_query() {
    assert_eq!(
        connector().build_query("Contact", &Filter::new()).unwrap(),
        QueryDescriptor::default()
    );
    assert_eq!(query(json!({})), json!({}));
}

#[test]
fn fields_become_attributes_to_retrieve() {
    assert_eq!(
        query(json!({ "fields": ["firstname", "lastname"] })),
        json!({ "attributesToRetrieve": ["firstname", "lastname"] })
    );
}

#[test]
fn free_text_query_passes_through() {
    assert_eq!(
        query(json!({ "query": "state:OR AND followers > 1000" })),
        json!({ "query": "state:OR AND followers > 1000" })
    );
}

#[test]
fn search_parameters_are_whitelisted() {
    assert_eq!(
        query(json!({
            "query": "state:OR AND followers > 1000",
            "restrictSearchableAttributes": ["firstname"],
            "typoTolerance": "min",
            "facets": ["state"],
            "attributesToHighlight": "invalid",
            "unknown": "invalid"
        })),
        json!({
            "query": "state:OR AND followers > 1000",
            "restrictSearchableAttributes": ["firstname"],
            "typoTolerance": "min",
            "facets": ["state"]
        })
    );
}

#[test]
fn where_and_raw_filters() {
    assert_eq!(
        query(json!({ "where": { "state": { "inq": ["OR", "CA"] } } })),
        json!({ "filters": r#"(state:"OR" OR state:"CA")"# })
    );
    assert_eq!(
        query(json!({ "filters": r#"state:"OR" OR state:"CA""# })),
        json!({ "filters": r#"state:"OR" OR state:"CA""# })
    );
}

#[test]
fn pagination() {
    assert_eq!(query(json!({ "limit": 5 })), json!({ "hitsPerPage": 5 }));
    assert_eq!(query(json!({ "offset": 4, "limit": 5 })), json!({ "hitsPerPage": 5 }));
    assert_eq!(
        query(json!({ "offset": 5, "limit": 5 })),
        json!({ "page": 1, "hitsPerPage": 5 })
    );
    assert_eq!(
        query(json!({ "offset": 7, "limit": 5 })),
        json!({ "page": 1, "hitsPerPage": 5 })
    );
    assert_eq!(
        query(json!({ "offset": 10, "limit": 5 })),
        json!({ "page": 2, "hitsPerPage": 5 })
    );
    assert_eq!(
        query(json!({ "offset": 14, "limit": 5 })),
        json!({ "page": 2, "hitsPerPage": 5 })
    );
    assert_eq!(
        query(json!({ "offset": 15, "limit": 5 })),
        json!({ "page": 3, "hitsPerPage": 5 })
    );
    assert_eq!(
        query(json!({ "page": 2, "limit": 5 })),
        json!({ "page": 2, "hitsPerPage": 5 })
    );
}

#[test]
fn wildcard_facets() {
    let filter = Filter::new().param("facets", "*");
    let descriptor = connector().build_query("Contact", &filter).unwrap();
    assert_eq!(descriptor.facets, Some(Selection::All));
}

// ============================================================================
// Where compilation
// ============================================================================

#[test]
fn build_where_compiles_in_document_names() {
    let connector = connector();
    let build = |clause: Value| connector.build_where("Contact", &clause).unwrap();

    assert_eq!(build(Value::Null), "");
    assert_eq!(
        build(json!({ "state": "OR", "city": "Salem" })),
        r#"state:"OR" AND city:"Salem""#
    );
    assert_eq!(
        build(json!({ "state": { "inq": ["OR", "CA"] } })),
        r#"(state:"OR" OR state:"CA")"#
    );
    assert_eq!(
        build(json!({ "id": 1234, "city": { "neq": "Salem" } })),
        r#"objectID:1234 AND NOT city:"Salem""#
    );
    assert_eq!(build(json!({ "tags": "vip" })), r#"_tags:"vip""#);
}

#[test]
fn merged_scopes_compile_flat() {
    let mut filter = Filter::new().with_where(json!({ "state": "OR" }));
    merge(
        &mut filter,
        &Filter::new().with_where(json!({ "city": { "neq": "Salem" } })),
        &MergeOptions::default(),
    );
    merge(
        &mut filter,
        &Filter::new().with_where(json!({ "followers": { "gt": 1000 } })),
        &MergeOptions::default(),
    );

    let clause = filter.where_.unwrap();
    assert_eq!(
        connector().build_where("Contact", &clause).unwrap(),
        r#"state:"OR" AND NOT city:"Salem" AND followers > 1000"#
    );
}

#[test]
fn typed_predicates_compile_like_untyped_trees() {
    let predicate = Predicate::and([
        Predicate::eq("id", 1234),
        Predicate::or([
            Predicate::inq("tags", ["vip", "press"]),
            Predicate::gte("followers", 1000),
        ]),
    ]);
    assert_eq!(
        connector().build_where("Contact", &predicate.into()).unwrap(),
        r#"objectID:1234 AND ((_tags:"vip" OR _tags:"press") OR followers >= 1000)"#
    );
}

#[test]
fn scopes_from_both_levels_apply() {
    let connector = Connector::from_json(r#"{ "queryScope": { "where": { "tenant": "acme" } } }"#)
        .unwrap()
        .with_model(
            ModelDefinition::from_json(
                r#"{ "name": "Contact", "settings": { "queryScope": { "where": { "active": true }, "limit": 20 } } }"#,
            )
            .unwrap(),
        );

    let descriptor = connector
        .build_query("Contact", &Filter::new().with_where(json!({ "state": "OR" })))
        .unwrap();
    assert_eq!(
        descriptor.filters.as_deref(),
        Some(r#"state:"OR" AND tenant:"acme" AND active:true"#)
    );
    assert_eq!(descriptor.hits_per_page, Some(20));
}

#[test]
fn caller_pagination_survives_model_scope() {
    let connector = Connector::new(ConnectorSettings::default()).with_model(
        ModelDefinition::from_yaml(
            r#"
name: Contact
settings:
  queryScope:
    where: { active: true }
    limit: 20
    offset: 0
"#,
        )
        .unwrap(),
    );

    let descriptor = connector
        .build_query("Contact", &Filter::new().limit(5).offset(10))
        .unwrap();
    assert_eq!(descriptor.filters.as_deref(), Some("active:true"));
    assert_eq!(descriptor.hits_per_page, Some(5));
    assert_eq!(descriptor.page, Some(2));

    let count = connector
        .count_query("Contact", &json!({ "state": "OR" }))
        .unwrap();
    assert_eq!(count.hits_per_page, Some(1));
    assert_eq!(count.page, None);
}

#[test]
fn count_query_snapshot() {
    let descriptor = connector()
        .count_query("Contact", &json!({ "state": "OR" }))
        .unwrap();
    insta::assert_json_snapshot!(descriptor, @r#"
    {
      "filters": "state:\"OR\"",
      "hitsPerPage": 1,
      "attributesToRetrieve": [],
      "attributesToHighlight": [],
      "attributesToSnippet": []
    }
    "#);
}

// ============================================================================
// Records and documents
// ============================================================================

#[test]
fn serialize_contact() {
    let mut record = doc(contact_data());
    record.insert("id".into(), json!("item-1234"));
    record.insert("unknown".into(), json!("ignored"));

    let document = connector()
        .serialize_data("Contact", &record, &SerializeOptions::default())
        .unwrap();
    assert_eq!(
        Value::Object(document),
        json!({
            "objectID": "item-1234",
            "firstname": "Fabien",
            "lastname": "Franzen",
            "company": "Atelier Fabien",
            "city": "Portland",
            "state": "OR",
            "followers": 1327,
            "registeredAt": 1490313600,
            "_tags": ["foo", "bar", "baz"]
        })
    );
}

#[test]
fn normalize_contact() {
    let record = connector()
        .normalize_data(
            "Contact",
            &doc(json!({
                "objectID": "item-1234",
                "firstname": "Fabien",
                "lastname": "Franzen",
                "company": "Atelier Fabien",
                "city": "Portland",
                "state": "OR",
                "followers": 1327,
                "registeredAt": 1490313600,
                "_tags": ["foo", "bar", "baz"],
                "unknown": "ignored"
            })),
        )
        .unwrap();

    let mut expected = doc(contact_data());
    expected.insert("id".into(), json!("item-1234"));
    assert_eq!(record, expected);
}

#[test]
fn normalize_hits_maps_every_hit() {
    let hits = vec![
        doc(json!({ "objectID": "a", "_tags": ["x"] })),
        doc(json!({ "objectID": "b", "_highlightResult": {} })),
    ];
    let records = connector().normalize_hits("Contact", &hits).unwrap();
    assert_eq!(
        records.into_iter().map(Value::Object).collect::<Vec<_>>(),
        vec![json!({ "id": "a", "tags": ["x"] }), json!({ "id": "b" })]
    );
}

#[test]
fn defaults_and_attributes_from_both_levels() {
    let connector = Connector::from_json(
        r#"{ "defaults": { "status": "new", "lang": "en" }, "attributes": { "source": "app" } }"#,
    )
    .unwrap()
    .with_model(
        ModelDefinition::new("Note")
            .defaults(doc(json!({ "status": "draft", "rank": 0 })).into())
            .attributes(ValueSource::computed(|ctx| {
                doc(json!({ "model": ctx.model, "source": "note" }))
            })),
    );

    let document = connector
        .serialize_data("Note", &doc(json!({ "id": 1, "rank": 3 })), &SerializeOptions::default())
        .unwrap();
    assert_eq!(
        Value::Object(document),
        json!({
            "objectID": 1,
            "rank": 3,
            "status": "new",
            "lang": "en",
            "source": "note",
            "model": "Note"
        })
    );
}

#[test]
fn timestamp_hook_from_definition() {
    let definition =
        ModelDefinition::from_json(r#"{ "name": "Event", "properties": { "at": { "type": "Date" } } }"#)
            .unwrap();
    let connector = Connector::from_json("{}").unwrap().with_model(
        definition.timestamp_hook(TimestampHook::new(|value, direction| match direction {
            Direction::Serialize => Some(json!({ "raw": value })),
            Direction::Normalize => value.get("raw").cloned(),
        })),
    );

    let document = connector
        .serialize_data("Event", &doc(json!({ "at": "soon" })), &SerializeOptions::default())
        .unwrap();
    assert_eq!(document.get("at"), Some(&json!({ "raw": "soon" })));
    let record = connector.normalize_data("Event", &document).unwrap();
    assert_eq!(record.get("at"), Some(&json!("soon")));
}

#[test]
fn create_and_update_documents() {
    let connector = connector();

    let options = SerializeOptions::default();
    let created = connector
        .create_document("Contact", &doc(json!({ "firstname": "Ada" })), &options)
        .unwrap();
    assert_eq!(Value::Object(created), json!({ "firstname": "Ada" }));

    let err = connector
        .create_document("Contact", &doc(json!({ "unknown": 1 })), &SerializeOptions::default())
        .unwrap_err();
    assert!(matches!(err, BridgeError::EmptyRecord { .. }));

    let updated = connector
        .update_document(
            "Contact",
            &json!(99),
            &doc(json!({ "tags": ["x"] })),
            &SerializeOptions::default(),
        )
        .unwrap();
    assert_eq!(Value::Object(updated), json!({ "_tags": ["x"], "objectID": "99" }));
}

#[test]
fn batches_use_connector_default() {
    let records: Vec<Document> = (0..1001).map(|i| doc(json!({ "id": i }))).collect();
    let batches = connector()
        .batches("Contact", &records, &SerializeOptions::default())
        .unwrap();
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![500, 500, 1]
    );
}

// ============================================================================
// Indexes
// ============================================================================

#[test]
fn model_index_settings() {
    let settings = connector().model_index_settings("Contact").unwrap();
    assert_eq!(
        Value::Object(settings),
        json!({
            "searchableAttributes": [
                "firstname",
                "lastname",
                "company",
                "city",
                "state",
                "followers",
                "registeredAt"
            ],
            "attributesForFaceting": ["state", "city", "followers", "registeredAt"],
            "unretrievableAttributes": ["isAdmin"]
        })
    );
}

#[test]
fn index_names() {
    let connector = connector();
    assert_eq!(connector.index_name("Contact", None).unwrap(), "dev_contacts");
    assert_eq!(
        connector.index_name("Contact", Some("tmp_contacts")).unwrap(),
        "tmp_contacts"
    );
    assert!(matches!(
        connector.index_name("Contact", Some("prod_contacts")),
        Err(BridgeError::InvalidIndex { .. })
    ));

    let plan = connector.index_plan("Contact").unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan.contains_key("dev_contacts"));
}

#[test]
fn destroy_plans() {
    let connector = connector();
    assert_eq!(
        connector
            .destroy_all_params("Contact", &json!({ "id": { "inq": ["a", "b"] } }), false)
            .unwrap(),
        DestroyPlan::ByIds(vec![json!("a"), json!("b")])
    );
    assert_eq!(
        connector
            .destroy_all_params("Contact", &json!({ "followers": { "lt": 10 } }), false)
            .unwrap(),
        DestroyPlan::ByQuery(doc(json!({ "filters": "followers < 10" })))
    );
    assert!(matches!(
        connector.destroy_all_params("Contact", &Value::Null, false),
        Err(BridgeError::UnguardedDestroy { .. })
    ));
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn invalid_configuration_is_reported() {
    assert!(matches!(
        Connector::from_yaml("indexName: [unclosed"),
        Err(BridgeError::Yaml(_))
    ));
    assert!(matches!(
        Connector::from_json("{ not json"),
        Err(BridgeError::Json(_))
    ));
    assert!(matches!(
        connector().build_query("Company", &Filter::new()),
        Err(BridgeError::UnknownModel { .. })
    ));
}
