//! Schema tree to flat map conversion.
//!
//! [`flatten`] walks a [`SchemaNode`] depth-first and records one
//! [`FlatEntry`] per node. Objects contribute their properties in declared
//! order; arrays contribute exactly one `items` child. An array that declares
//! no `items` still gets one: a hidden `{"type": "object"}` placeholder, so an
//! editor can present the item schema as an editable child without changing
//! the public document.
//!
//! # Example
//!
//! ```
//! use form_schema_core::*;
//! use serde_json::json;
//!
//! let flat = flatten_value(&json!({
//!     "type": "object",
//!     "properties": {
//!         "name": { "type": "string" },
//!         "tags": { "type": "array", "items": { "type": "string" } }
//!     }
//! }))
//! .unwrap();
//!
//! let ids: Vec<&str> = flat.ids().collect();
//! assert_eq!(ids, vec!["#", "#/name", "#/tags", "#/tags/[]"]);
//! assert_eq!(flat.get("#/tags/[]").unwrap().slot, Slot::Items);
//! ```

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::id::{IdAllocator, IdRequest, PathAllocator};
use crate::types::{FlatEntry, FlatMap, Keywords, NodeKind, ROOT_ID, SchemaNode, Shape, Slot};

const REF_KEYWORD: &str = "$ref";
const DEFINITION_ROOTS: [&str; 2] = ["definitions", "$defs"];

/// Flattening behavior.
#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    /// Inline local `$ref`s (`#/definitions/x`, `#/$defs/x`) from the root's
    /// definitions instead of keeping `$ref` as an ordinary keyword.
    pub resolve_refs: bool,
}

/// Flattens a schema tree using position-based ids.
///
/// # Errors
///
/// Returns [`SchemaError::DuplicateIdentifier`] if two nodes request the same
/// `$id`.
pub fn flatten(schema: &SchemaNode) -> Result<FlatMap> {
    flatten_with(schema, &mut PathAllocator::default(), &FlattenOptions::default())
}

/// Parses and flattens a JSON schema document.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`] if the document is not a valid
/// schema tree, or any error of [`flatten`].
pub fn flatten_value(schema: &Value) -> Result<FlatMap> {
    flatten(&SchemaNode::from_value(schema)?)
}

/// Flattens a schema tree with a custom allocator and options.
///
/// # Errors
///
/// Returns [`SchemaError::DuplicateIdentifier`] if the allocator or a `$id`
/// produces an id already in use, and [`SchemaError::MalformedSchema`] for
/// unresolvable or cyclic `$ref` chains when `resolve_refs` is set.
pub fn flatten_with(
    schema: &SchemaNode,
    allocator: &mut dyn IdAllocator,
    options: &FlattenOptions,
) -> Result<FlatMap> {
    let definitions = if options.resolve_refs {
        Some(schema.keywords.clone())
    } else {
        None
    };
    let mut flattener = Flattener {
        map: FlatMap::default(),
        allocator,
        definitions,
        ref_stack: Vec::new(),
    };
    flattener.visit(schema, None, Slot::Root, false)?;
    Ok(flattener.map)
}

/// Flattens `node` into an existing map as a new child of `parent`.
///
/// The parent's child list is not touched; the caller links the returned id.
pub(crate) fn flatten_into(
    map: FlatMap,
    node: &SchemaNode,
    parent: &str,
    slot: Slot,
    allocator: &mut dyn IdAllocator,
) -> Result<(FlatMap, String)> {
    let mut flattener = Flattener {
        map,
        allocator,
        definitions: None,
        ref_stack: Vec::new(),
    };
    let id = flattener.visit(node, Some(parent), slot, false)?;
    Ok((flattener.map, id))
}

/// Placeholder item schema for arrays that declare none.
pub(crate) fn placeholder_items() -> SchemaNode {
    SchemaNode::object()
}

struct Flattener<'a> {
    map: FlatMap,
    allocator: &'a mut dyn IdAllocator,
    /// Root keywords holding `definitions`/`$defs`, when refs are resolved.
    definitions: Option<Keywords>,
    /// `$ref`s being expanded on the current path.
    ref_stack: Vec<String>,
}

impl Flattener<'_> {
    fn visit(
        &mut self,
        node: &SchemaNode,
        parent: Option<&str>,
        slot: Slot,
        hidden: bool,
    ) -> Result<String> {
        if let Some(reference) = self.local_ref(node) {
            return self.visit_reference(node, reference, parent, slot, hidden);
        }

        let id = self.assign_id(node, parent, &slot)?;
        // Reserve the id before descending so children cannot claim it, and
        // so the entry keeps its pre-order position.
        self.map.insert(FlatEntry {
            id: id.clone(),
            parent: parent.map(str::to_string),
            kind: node.kind(),
            slot,
            schema: node.keywords.clone(),
            children: Vec::new(),
            hidden,
            value: None,
            present: false,
        });

        let children = match &node.shape {
            Shape::Leaf => Vec::new(),
            Shape::Object(properties) => {
                let mut children = Vec::with_capacity(properties.len());
                for (name, child) in properties {
                    children.push(self.visit(child, Some(&id), Slot::Property(name.clone()), false)?);
                }
                children
            }
            Shape::Array(Some(items)) => vec![self.visit(items, Some(&id), Slot::Items, false)?],
            Shape::Array(None) => {
                vec![self.visit(&placeholder_items(), Some(&id), Slot::Items, true)?]
            }
        };

        self.map.update(&id, |entry| entry.children = children);
        Ok(id)
    }

    fn assign_id(&mut self, node: &SchemaNode, parent: Option<&str>, slot: &Slot) -> Result<String> {
        let id = match (parent, &node.id) {
            (None, requested) => {
                if let Some(requested) = requested.as_deref().filter(|r| *r != ROOT_ID) {
                    debug!(requested, "ignoring requested id on root node");
                }
                ROOT_ID.to_string()
            }
            (Some(_), Some(requested)) => requested.clone(),
            (Some(_), None) => {
                let request = IdRequest { parent, slot };
                self.allocator.allocate(&request, &self.map)
            }
        };
        if self.map.contains(&id) {
            return Err(SchemaError::DuplicateIdentifier(id));
        }
        Ok(id)
    }

    /// Returns the local `$ref` of `node` when ref resolution is enabled.
    fn local_ref(&self, node: &SchemaNode) -> Option<String> {
        self.definitions.as_ref()?;
        let reference = node.keywords.get(REF_KEYWORD)?.as_str()?;
        if reference.starts_with("#/") {
            Some(reference.to_string())
        } else {
            debug!(reference, "keeping non-local $ref as a keyword");
            None
        }
    }

    fn visit_reference(
        &mut self,
        node: &SchemaNode,
        reference: String,
        parent: Option<&str>,
        slot: Slot,
        hidden: bool,
    ) -> Result<String> {
        let location = IdRequest {
            parent,
            slot: &slot,
        }
        .path();
        if self.ref_stack.contains(&reference) {
            return Err(SchemaError::malformed(
                location,
                format!("cyclic $ref chain through `{reference}`"),
            ));
        }

        let target = self
            .resolve_definition(&reference)
            .ok_or_else(|| SchemaError::malformed(&location, format!("unresolvable $ref `{reference}`")))?;
        let mut resolved = SchemaNode::from_value(&target)
            .map_err(|e| SchemaError::malformed(&location, format!("invalid target of `{reference}`: {e}")))?;

        // Keywords next to `$ref` refine the referenced schema.
        for (key, value) in &node.keywords {
            if key != REF_KEYWORD {
                resolved.keywords.insert(key.clone(), value.clone());
            }
        }
        if node.id.is_some() {
            resolved.id = node.id.clone();
        }
        if NodeKind::from_type(&resolved.keywords).is_some_and(|kind| kind != resolved.kind()) {
            return Err(SchemaError::malformed(
                location,
                "`type` next to $ref contradicts the referenced schema",
            ));
        }

        self.ref_stack.push(reference);
        let id = self.visit(&resolved, parent, slot, hidden);
        self.ref_stack.pop();
        id
    }

    fn resolve_definition(&self, reference: &str) -> Option<Value> {
        let definitions = self.definitions.as_ref()?;
        let mut segments = reference.strip_prefix("#/")?.split('/');
        let root = segments.next()?;
        if !DEFINITION_ROOTS.contains(&root) {
            return None;
        }
        let mut current = definitions.get(root)?;
        for segment in segments {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            current = current.get(segment.as_str())?;
        }
        Some(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::id::fn_allocator;

    #[test]
    fn test_flatten_records_parent_and_order() {
        let flat = flatten_value(&json!({
            "type": "object",
            "properties": {
                "b": { "type": "string" },
                "a": { "type": "number" }
            }
        }))
        .unwrap();

        let root = flat.root().unwrap();
        assert!(root.parent.is_none());
        assert_eq!(root.children, vec!["#/b", "#/a"]);
        assert_eq!(flat.get("#/a").unwrap().parent.as_deref(), Some("#"));
        assert_eq!(flat.get("#/a").unwrap().slot, Slot::Property("a".into()));
    }

    #[test]
    fn test_flatten_strips_nested_keywords() {
        let flat = flatten_value(&json!({
            "type": "object",
            "title": "Root",
            "properties": { "list": { "type": "array", "items": { "type": "string" } } }
        }))
        .unwrap();

        let root = flat.root().unwrap();
        assert_eq!(root.schema.get("title"), Some(&json!("Root")));
        assert!(!root.schema.contains_key("properties"));
        assert!(!flat.get("#/list").unwrap().schema.contains_key("items"));
    }

    #[test]
    fn test_array_without_items_gets_hidden_placeholder() {
        let flat = flatten_value(&json!({
            "type": "object",
            "properties": { "list": { "type": "array" } }
        }))
        .unwrap();

        let placeholder = flat.get("#/list/[]").unwrap();
        assert!(placeholder.hidden);
        assert_eq!(placeholder.kind, NodeKind::Object);
        assert_eq!(flat.get("#/list").unwrap().children, vec!["#/list/[]"]);
    }

    #[test]
    fn test_requested_ids_are_reused() {
        let flat = flatten_value(&json!({
            "type": "object",
            "properties": { "name": { "$id": "#/renamed_field", "type": "string" } }
        }))
        .unwrap();
        assert!(flat.contains("#/renamed_field"));
        assert_eq!(flat.root().unwrap().children, vec!["#/renamed_field"]);
    }

    #[test]
    fn test_duplicate_requested_ids_fail() {
        let err = flatten_value(&json!({
            "type": "object",
            "properties": {
                "a": { "$id": "#/same", "type": "string" },
                "b": { "$id": "#/same", "type": "string" }
            }
        }))
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateIdentifier("#/same".into()));
    }

    #[test]
    fn test_colliding_custom_allocator_fails() {
        let schema = SchemaNode::object()
            .with_property("a", SchemaNode::leaf("string"))
            .with_property("b", SchemaNode::leaf("string"));
        let mut allocator = fn_allocator(|_| "fixed".to_string());
        let err = flatten_with(&schema, &mut allocator, &FlattenOptions::default()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateIdentifier("fixed".into()));
    }

    #[test]
    fn test_refs_kept_as_keywords_by_default() {
        let flat = flatten_value(&json!({
            "type": "object",
            "definitions": { "name": { "type": "string" } },
            "properties": { "first": { "$ref": "#/definitions/name" } }
        }))
        .unwrap();
        assert_eq!(
            flat.get("#/first").unwrap().schema.get("$ref"),
            Some(&json!("#/definitions/name"))
        );
    }

    #[test]
    fn test_refs_resolved_when_enabled() {
        let schema = SchemaNode::from_value(&json!({
            "type": "object",
            "$defs": {
                "address": {
                    "type": "object",
                    "properties": { "city": { "type": "string" } }
                }
            },
            "properties": { "home": { "$ref": "#/$defs/address", "title": "Home" } }
        }))
        .unwrap();
        let options = FlattenOptions { resolve_refs: true };
        let flat = flatten_with(&schema, &mut PathAllocator::default(), &options).unwrap();

        let home = flat.get("#/home").unwrap();
        assert_eq!(home.kind, NodeKind::Object);
        assert_eq!(home.schema.get("title"), Some(&json!("Home")));
        assert!(!home.schema.contains_key("$ref"));
        assert!(flat.contains("#/home/city"));
    }

    #[test]
    fn test_cyclic_refs_are_malformed() {
        let schema = SchemaNode::from_value(&json!({
            "type": "object",
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": { "next": { "$ref": "#/definitions/node" } }
                }
            },
            "properties": { "head": { "$ref": "#/definitions/node" } }
        }))
        .unwrap();
        let options = FlattenOptions { resolve_refs: true };
        let err = flatten_with(&schema, &mut PathAllocator::default(), &options).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSchema { ref reason, .. } if reason.contains("cyclic")));
    }

    #[test]
    fn test_unresolvable_ref_is_malformed() {
        let schema = SchemaNode::from_value(&json!({
            "type": "object",
            "properties": { "x": { "$ref": "#/definitions/missing" } }
        }))
        .unwrap();
        let options = FlattenOptions { resolve_refs: true };
        let err = flatten_with(&schema, &mut PathAllocator::default(), &options).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSchema { .. }));
    }

    #[test]
    fn test_flatten_does_not_touch_input() {
        let schema = SchemaNode::object().with_property("a", SchemaNode::leaf("string"));
        let before = schema.clone();
        flatten(&schema).unwrap();
        assert_eq!(schema, before);
    }
}
