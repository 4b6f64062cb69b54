//! Structural validation of flat maps.
//!
//! Operations in this crate only ever produce consistent maps, so validation
//! is for maps that come from elsewhere: deserialized snapshots, hand-built
//! fixtures, or a host that stored a map between sessions.
//!
//! # Examples
//!
//! ```
//! use form_schema_core::*;
//! use serde_json::json;
//!
//! let flat = flatten_value(&json!({
//!     "type": "object",
//!     "properties": { "tags": { "type": "array", "items": { "type": "string" } } }
//! }))
//! .unwrap();
//! assert!(validate_flat_map(&flat).is_empty());
//!
//! // Drop the item schema: the array is left without its items slot.
//! let broken: FlatMap = flat.iter().filter(|e| e.id != "#/tags/[]").cloned().collect();
//! assert!(!validate_flat_map(&broken).is_empty());
//! ```

use std::collections::HashSet;

use crate::error::SchemaError;
use crate::types::{FlatEntry, FlatMap, NodeKind, ROOT_ID, Slot};

/// Validates the structural invariants of a flat map.
///
/// Checks that the root exists and is an object, that parent and child links
/// agree, that each child sits in the slot its parent's kind allows, that
/// every array has exactly one item schema, that sibling property names are
/// unique, that declared types agree with entry kinds, that no child list
/// leads back to an ancestor, and that every entry is reachable from the
/// root.
///
/// Returns every problem found; an empty list means the map is consistent.
pub fn validate_flat_map(map: &FlatMap) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    let Some(root) = map.root() else {
        errors.push(SchemaError::broken(ROOT_ID, "flat map root"));
        return errors;
    };
    if root.kind != NodeKind::Object {
        errors.push(SchemaError::malformed(ROOT_ID, "the root must be an object"));
    }
    if root.parent.is_some() || root.slot != Slot::Root {
        errors.push(SchemaError::malformed(ROOT_ID, "the root cannot have a parent"));
    }

    for entry in map.iter() {
        errors.extend(validate_entry(map, entry));
    }

    let mut walk = Walk {
        map,
        reached: HashSet::from([root.id.as_str()]),
        path: HashSet::new(),
        errors: Vec::new(),
    };
    walk.visit(root);
    errors.append(&mut walk.errors);
    if walk.reached.len() != map.len() {
        for id in map.ids().filter(|id| !walk.reached.contains(id)) {
            errors.push(SchemaError::malformed(id, "entry is not reachable from the root"));
        }
    }

    errors
}

/// Depth-first walk from the root collecting reachable ids and the entries
/// whose child lists lead back to one of their ancestors.
struct Walk<'m> {
    map: &'m FlatMap,
    reached: HashSet<&'m str>,
    path: HashSet<&'m str>,
    errors: Vec<SchemaError>,
}

impl<'m> Walk<'m> {
    fn visit(&mut self, entry: &'m FlatEntry) {
        self.path.insert(entry.id.as_str());
        for child_id in &entry.children {
            let Some(child) = self.map.get(child_id) else {
                continue;
            };
            if self.path.contains(child.id.as_str()) {
                self.errors
                    .push(SchemaError::malformed(&entry.id, "child lists form a cycle"));
            } else if self.reached.insert(child.id.as_str()) {
                self.visit(child);
            }
        }
        self.path.remove(entry.id.as_str());
    }
}

fn validate_entry(map: &FlatMap, entry: &FlatEntry) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    let id = entry.id.as_str();

    if NodeKind::from_type(&entry.schema).is_some_and(|declared| declared != entry.kind) {
        errors.push(SchemaError::malformed(id, "declared type does not match entry kind"));
    }

    if id != ROOT_ID {
        match entry.parent.as_deref().map(|parent| (parent, map.get(parent))) {
            None => errors.push(SchemaError::malformed(id, "only the root may lack a parent")),
            Some((parent, None)) => errors.push(SchemaError::broken(parent, id)),
            Some((parent, Some(owner))) => {
                if !owner.children.iter().any(|child| child == id) {
                    errors.push(SchemaError::malformed(
                        id,
                        format!("parent `{parent}` does not list this entry"),
                    ));
                }
            }
        }
    }

    match entry.kind {
        NodeKind::Leaf => {
            if !entry.children.is_empty() {
                errors.push(SchemaError::malformed(id, "leaf entries cannot have children"));
            }
        }
        NodeKind::Object => {
            if entry.value.is_some() {
                errors.push(SchemaError::malformed(id, "object entries carry no value"));
            }
            let mut names = HashSet::new();
            for child in children(map, entry, &mut errors) {
                match &child.slot {
                    Slot::Property(name) if !names.insert(name.as_str()) => errors.push(
                        SchemaError::malformed(id, format!("duplicate property `{name}`")),
                    ),
                    Slot::Property(_) => {}
                    _ => errors.push(SchemaError::malformed(
                        &child.id,
                        "object children must be properties",
                    )),
                }
            }
        }
        NodeKind::Array => {
            if entry.children.len() != 1 {
                errors.push(SchemaError::malformed(id, "arrays need exactly one item schema"));
            }
            for child in children(map, entry, &mut errors) {
                if child.slot != Slot::Items {
                    errors.push(SchemaError::malformed(&child.id, "array children must be items"));
                }
            }
        }
    }

    errors
}

/// Resolves child ids, recording missing ones and children that point back
/// at a different parent.
fn children<'m>(map: &'m FlatMap, entry: &FlatEntry, errors: &mut Vec<SchemaError>) -> Vec<&'m FlatEntry> {
    let mut resolved = Vec::with_capacity(entry.children.len());
    for child_id in &entry.children {
        match map.get(child_id) {
            None => errors.push(SchemaError::broken(child_id, &entry.id)),
            Some(child) if child.parent.as_deref() != Some(entry.id.as_str()) => {
                errors.push(SchemaError::malformed(
                    child_id,
                    format!("listed under `{}` but points at another parent", entry.id),
                ));
            }
            Some(child) => resolved.push(child),
        }
    }
    resolved
}
