//! End-to-end behavior of the flat map operations through the public API.

use form_schema_core::*;
use serde_json::{Value, json};

fn profile_schema() -> Value {
    json!({
        "type": "object",
        "title": "Profile",
        "properties": {
            "name": { "type": "string", "title": "Name", "minLength": 1 },
            "age": { "type": "number", "default": 18 },
            "active": { "type": "boolean" },
            "address": {
                "type": "object",
                "properties": {
                    "street": { "type": "string" },
                    "city": { "type": "string", "widget": "select", "enum": ["London", "Paris"] }
                }
            },
            "tags": { "type": "array", "items": { "type": "string" } },
            "contacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string" },
                        "value": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn profile_data() -> Value {
    json!({
        "name": "Ada",
        "age": 36,
        "active": true,
        "address": { "street": "1 Analytical Way", "city": "London" },
        "tags": ["math", "engines"],
        "contacts": [
            { "kind": "email", "value": "ada@example.com" },
            { "kind": "phone", "value": "+44 0000" }
        ]
    })
}

fn keywords(value: Value) -> Keywords {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_roundtrip_reproduces_schema() {
    let schema = profile_schema();
    let flat = flatten_value(&schema).unwrap();
    assert_eq!(unflatten_value(&flat, ROOT_ID, false).unwrap(), schema);
}

#[test]
fn test_roundtrip_keeps_declared_order() {
    let flat = flatten_value(&json!({
        "type": "object",
        "properties": { "a": { "type": "string" }, "b": { "type": "number" } }
    }))
    .unwrap();
    let rebuilt = unflatten(&flat, ROOT_ID, false).unwrap();
    let names: Vec<&str> = rebuilt.properties().unwrap().keys().map(String::as_str).collect();
    assert_eq!(names, ["a", "b"]);

    let serialized = serde_json::to_string(&rebuilt.to_value()).unwrap();
    assert!(serialized.find("\"a\"").unwrap() < serialized.find("\"b\"").unwrap());
}

#[test]
fn test_internal_form_reflattens_to_same_ids() {
    let flat = flatten_value(&json!({
        "type": "object",
        "properties": { "list": { "type": "array" }, "n": { "type": "number" } }
    }))
    .unwrap();
    let internal = unflatten_value(&flat, ROOT_ID, true).unwrap();
    let again = flatten_value(&internal).unwrap();
    assert_eq!(again.ids().collect::<Vec<_>>(), flat.ids().collect::<Vec<_>>());
}

#[test]
fn test_data_survives_merge_and_extract() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let bound = merge_data(&flat, &profile_data());
    assert_eq!(extract_data(&bound), profile_data());
}

#[test]
fn test_empty_nested_object_survives_merge_and_extract() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let data = json!({ "name": "Ada", "address": {} });
    assert_eq!(extract_data(&merge_data(&flat, &data)), data);
}

#[test]
fn test_unknown_data_keys_are_dropped() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let bound = merge_data(&flat, &json!({ "name": "Ada", "nickname": "Countess" }));
    assert_eq!(extract_data(&bound), json!({ "name": "Ada" }));
}

#[test]
fn test_mismatched_values_are_reported_and_dropped() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let (bound, mismatches) =
        merge_data_with_report(&flat, &json!({ "name": "Ada", "address": "somewhere" }));
    assert_eq!(extract_data(&bound), json!({ "name": "Ada" }));
    assert_eq!(
        mismatches,
        vec![ValueMismatch {
            id: "#/address".into(),
            expected: "object".into(),
            found: "string",
        }]
    );
}

#[test]
fn test_mutation_keeps_other_ids() {
    let flat = merge_data(&flatten_value(&profile_schema()).unwrap(), &profile_data());
    let before: Vec<String> = flat.ids().map(str::to_string).collect();

    let patch = EntryPatch::schema(keywords(json!({ "type": "string", "title": "Full name" })));
    let edited = mutate_entry(&flat, "#/name", patch).unwrap();

    let after: Vec<String> = edited.ids().map(str::to_string).collect();
    assert_eq!(before, after);
    assert_eq!(extract_data(&edited), profile_data());
}

#[test]
fn test_object_to_string_cascade_removes_descendants() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let edited =
        mutate_entry(&flat, "#/address", EntryPatch::schema(keywords(json!({ "type": "string" }))))
            .unwrap();

    assert!(edited.ids().all(|id| !id.starts_with("#/address/")));
    assert_eq!(edited.len(), flat.len() - 2);
    assert!(validate_flat_map(&edited).is_empty());
}

#[test]
fn test_string_to_object_cascade_adds_empty_properties() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let edited =
        mutate_entry(&flat, "#/name", EntryPatch::schema(keywords(json!({ "type": "object" }))))
            .unwrap();

    assert_eq!(edited.ids().collect::<Vec<_>>(), flat.ids().collect::<Vec<_>>());
    let rebuilt = unflatten_value(&edited, ROOT_ID, false).unwrap();
    assert_eq!(rebuilt["properties"]["name"], json!({ "type": "object", "properties": {} }));
}

#[test]
fn test_missing_child_is_a_broken_reference() {
    let flat = flatten_value(&profile_schema()).unwrap();
    let broken: FlatMap = flat
        .iter()
        .filter(|entry| entry.id != "#/address/city")
        .cloned()
        .collect();
    match unflatten(&broken, ROOT_ID, false) {
        Err(SchemaError::BrokenReference { id, .. }) => assert_eq!(id, "#/address/city"),
        other => panic!("expected a broken reference, got {other:?}"),
    }
}

#[test]
fn test_bind_then_retype_then_remerge() {
    let flat = flatten_value(&json!({
        "type": "object",
        "properties": { "name": { "type": "string" } }
    }))
    .unwrap();
    assert_eq!(flat.ids().collect::<Vec<_>>(), ["#", "#/name"]);

    let bound = merge_data(&flat, &json!({ "name": "Ada" }));
    assert_eq!(bound.get("#/name").unwrap().value, Some(json!("Ada")));
    assert_eq!(extract_data(&bound), json!({ "name": "Ada" }));

    let edited =
        mutate_entry(&bound, "#/name", EntryPatch::schema(keywords(json!({ "type": "number" }))))
            .unwrap();
    assert_eq!(extract_data(&edited), json!({ "name": "Ada" }));

    // The conflict only surfaces on the next merge.
    let (remerged, mismatches) = merge_data_with_report(&edited, &extract_data(&edited));
    assert_eq!(extract_data(&remerged), json!({}));
    assert_eq!(mismatches.len(), 1);
}

#[test]
fn test_legacy_document_flattens_like_current() {
    let legacy = json!({
        "propsSchema": {
            "type": "object",
            "properties": { "bio": { "type": "string" } }
        },
        "uiSchema": { "bio": { "ui:widget": "textarea" } }
    });
    let flat = flatten(&normalize_version(&legacy).unwrap()).unwrap();
    assert_eq!(flat.get("#/bio").unwrap().schema.get("widget"), Some(&json!("textarea")));
}

#[test]
fn test_custom_allocator_collision_is_rejected() {
    let schema = SchemaNode::object()
        .with_property("a", SchemaNode::leaf("string"))
        .with_property("b", SchemaNode::leaf("string"));
    let mut allocator = fn_allocator(|request: &IdRequest<'_>| match request.parent {
        None => ROOT_ID.to_string(),
        Some(_) => "same".to_string(),
    });
    let err = flatten_with(&schema, &mut allocator, &FlattenOptions::default()).unwrap_err();
    assert_eq!(err, SchemaError::DuplicateIdentifier("same".into()));
}

#[test]
fn test_stale_snapshot_is_unaffected_by_edits() {
    let flat = merge_data(&flatten_value(&profile_schema()).unwrap(), &profile_data());
    let snapshot = flat.clone();
    let edited = remove_entry(&flat, "#/contacts").unwrap();
    let edited = mutate_entry(&edited, "#/name", EntryPatch::value(json!("Grace"))).unwrap();

    assert_eq!(extract_data(&snapshot), profile_data());
    assert_eq!(extract_data(&edited)["name"], "Grace");
    assert!(extract_data(&edited).get("contacts").is_none());
}

#[test]
fn test_cyclic_flat_map_fails_check() {
    let cyclic: FlatMap = serde_json::from_value(json!({
        "#": { "id": "#", "kind": "object", "slot": "root", "schema": {}, "children": ["#/a"] },
        "#/a": {
            "id": "#/a",
            "parent": "#",
            "kind": "object",
            "slot": { "property": "a" },
            "schema": {},
            "children": ["#"]
        }
    }))
    .unwrap();
    assert!(cyclic.check().is_err());
    assert!(validate_flat_map(&cyclic).iter().any(|e| e.to_string().contains("cycle")));
    assert_eq!(extract_data(&cyclic), json!({}));
}
