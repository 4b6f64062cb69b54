//! Flat map guarantees checked over generated schemas and matching data.

use form_schema_core::*;
use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn leaf_schema() -> impl Strategy<Value = SchemaNode> {
    (
        prop_oneof![Just("string"), Just("number"), Just("integer"), Just("boolean")],
        prop::option::of("[A-Z][a-z]{0,5}"),
    )
        .prop_map(|(ty, title)| match title {
            Some(title) => SchemaNode::leaf(ty).with_keyword("title", Value::from(title)),
            None => SchemaNode::leaf(ty),
        })
}

/// `{"type": "array"}` without an item schema.
fn untyped_array() -> SchemaNode {
    SchemaNode {
        shape: Shape::Array(None),
        ..SchemaNode::leaf("array")
    }
}

/// Object with the given properties; later duplicates of a name are skipped.
fn object_of(fields: Vec<(String, SchemaNode)>) -> SchemaNode {
    fields.into_iter().fold(SchemaNode::object(), |node, (name, child)| {
        if node.properties().is_some_and(|props| props.contains_key(&name)) {
            node
        } else {
            node.with_property(name, child)
        }
    })
}

fn schema_node() -> impl Strategy<Value = SchemaNode> {
    leaf_schema().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(("[a-z]{1,4}", inner.clone()), 0..4).prop_map(object_of),
            inner.prop_map(SchemaNode::array),
            Just(untyped_array()),
        ]
    })
}

fn root_schema() -> impl Strategy<Value = SchemaNode> {
    prop::collection::vec(("[a-z]{1,4}", schema_node()), 0..5).prop_map(object_of)
}

fn leaf_data(node: &SchemaNode) -> BoxedStrategy<Value> {
    let value = match node.keywords.get("type").and_then(Value::as_str) {
        Some("string") => "[a-z]{0,6}".prop_map(Value::from).boxed(),
        Some("boolean") => any::<bool>().prop_map(Value::from).boxed(),
        _ => any::<i32>().prop_map(Value::from).boxed(),
    };
    prop_oneof![1 => Just(Value::Null), 4 => value].boxed()
}

/// Form data shaped like `node`, with any property possibly left out.
fn data_for(node: &SchemaNode) -> BoxedStrategy<Value> {
    match &node.shape {
        Shape::Leaf => leaf_data(node),
        Shape::Object(properties) => {
            let fields: Vec<BoxedStrategy<Option<(String, Value)>>> = properties
                .iter()
                .map(|(name, child)| {
                    let name = name.clone();
                    prop::option::of(data_for(child))
                        .prop_map(move |value| value.map(|value| (name.clone(), value)))
                        .boxed()
                })
                .collect();
            fields
                .prop_map(|fields| Value::Object(fields.into_iter().flatten().collect::<Map<_, _>>()))
                .boxed()
        }
        Shape::Array(Some(items)) => prop::collection::vec(data_for(items), 0..3)
            .prop_map(Value::Array)
            .boxed(),
        Shape::Array(None) => prop::collection::vec(any::<i32>().prop_map(Value::from), 0..3)
            .prop_map(Value::Array)
            .boxed(),
    }
}

fn schema_and_data() -> impl Strategy<Value = (SchemaNode, Value)> {
    root_schema().prop_flat_map(|schema| {
        let data = data_for(&schema);
        (Just(schema), data)
    })
}

fn nth_id(flat: &FlatMap, index: &Index) -> String {
    let ids: Vec<&str> = flat.ids().collect();
    ids[index.index(ids.len())].to_string()
}

fn nth_property_or_item(flat: &FlatMap, index: &Index) -> Option<String> {
    let ids: Vec<&str> = flat.ids().filter(|id| *id != ROOT_ID).collect();
    (!ids.is_empty()).then(|| ids[index.index(ids.len())].to_string())
}

fn with_type(keywords: &Keywords, ty: &str) -> Keywords {
    let mut keywords = keywords.clone();
    keywords.insert("type".into(), Value::from(ty));
    keywords
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn test_unflatten_inverts_flatten(schema in root_schema()) {
        let flat = flatten(&schema).unwrap();
        prop_assert!(validate_flat_map(&flat).is_empty());
        prop_assert_eq!(unflatten(&flat, ROOT_ID, false).unwrap(), schema);
    }

    #[test]
    fn test_internal_form_keeps_ids(schema in root_schema()) {
        let flat = flatten(&schema).unwrap();
        let internal = unflatten(&flat, ROOT_ID, true).unwrap();
        let again = flatten(&internal).unwrap();
        prop_assert_eq!(again.ids().collect::<Vec<_>>(), flat.ids().collect::<Vec<_>>());
    }

    #[test]
    fn test_extract_inverts_merge((schema, data) in schema_and_data()) {
        let flat = flatten(&schema).unwrap();
        let (bound, mismatches) = merge_data_with_report(&flat, &data);
        prop_assert!(mismatches.is_empty());
        prop_assert_eq!(extract_data(&bound), data.clone());

        let remerged = merge_data(&bound, &extract_data(&bound));
        prop_assert_eq!(extract_data(&remerged), data);
    }

    #[test]
    fn test_keyword_edit_keeps_ids_and_data(
        (schema, data) in schema_and_data(),
        index in any::<Index>(),
    ) {
        let flat = merge_data(&flatten(&schema).unwrap(), &data);
        let id = nth_id(&flat, &index);
        let mut keywords = flat.get(&id).unwrap().schema.clone();
        keywords.insert("description".into(), Value::from("edited"));

        let edited = mutate_entry(&flat, &id, EntryPatch::schema(keywords)).unwrap();
        prop_assert_eq!(edited.ids().collect::<Vec<_>>(), flat.ids().collect::<Vec<_>>());
        for other in flat.ids().filter(|other| *other != id) {
            prop_assert!(edited.shares_entry(&flat, other));
        }
        prop_assert_eq!(extract_data(&edited), data);
    }

    #[test]
    fn test_retype_to_leaf_drops_descendants(
        schema in root_schema(),
        index in any::<Index>(),
    ) {
        let flat = flatten(&schema).unwrap();
        let Some(id) = nth_property_or_item(&flat, &index) else {
            return Ok(());
        };
        let doomed = flat.descendants(&id);
        let keywords = with_type(&flat.get(&id).unwrap().schema, "string");

        let edited = mutate_entry(&flat, &id, EntryPatch::schema(keywords)).unwrap();
        prop_assert_eq!(edited.len(), flat.len() - doomed.len());
        prop_assert!(doomed.iter().all(|gone| !edited.contains(gone)));
        prop_assert!(edited.get(&id).unwrap().children.is_empty());
        prop_assert!(validate_flat_map(&edited).is_empty());
    }

    #[test]
    fn test_retype_to_container_rebuilds_children(
        schema in root_schema(),
        index in any::<Index>(),
        to_array in any::<bool>(),
    ) {
        let flat = flatten(&schema).unwrap();
        let Some(id) = nth_property_or_item(&flat, &index) else {
            return Ok(());
        };
        let before = flat.get(&id).unwrap().kind;
        let (ty, kind) = if to_array { ("array", NodeKind::Array) } else { ("object", NodeKind::Object) };
        let keywords = with_type(&flat.get(&id).unwrap().schema, ty);

        let edited = mutate_entry(&flat, &id, EntryPatch::schema(keywords)).unwrap();
        let entry = edited.get(&id).unwrap();
        prop_assert_eq!(entry.kind, kind);
        if before != kind {
            match kind {
                NodeKind::Array => {
                    prop_assert_eq!(entry.children.len(), 1);
                    prop_assert!(edited.get(&entry.children[0]).unwrap().hidden);
                }
                _ => {
                    prop_assert!(entry.children.is_empty());
                }
            }
        }
        prop_assert!(validate_flat_map(&edited).is_empty());
    }
}
