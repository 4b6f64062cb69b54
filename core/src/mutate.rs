//! Copy-on-write edits of a flat map.
//!
//! Every operation takes a map by reference and returns a new map. Entries
//! the edit does not touch are shared with the input, so holders of the old
//! map keep observing a consistent snapshot and repeated edits stay cheap.
//! On error the input is left exactly as it was.
//!
//! [`mutate_entry`] replaces a single entry. It never changes ids and never
//! reorders siblings; the only cascade is the explicit one caused by a kind
//! change (see [`mutate_entry`]). The structural helpers
//! ([`insert_property`], [`remove_entry`], [`move_entry`],
//! [`duplicate_entry`]) back drag-and-drop and copy/paste in an editor.
//! Their `_with` variants name new entries with a caller's [`IdAllocator`].
//!
//! # Example
//!
//! ```
//! use form_schema_core::*;
//! use serde_json::json;
//!
//! let flat = flatten_value(&json!({
//!     "type": "object",
//!     "properties": { "name": { "type": "string" } }
//! }))
//! .unwrap();
//! let flat = merge_data(&flat, &json!({ "name": "Ada" }));
//!
//! let patch = EntryPatch::schema(json!({ "type": "number" }).as_object().unwrap().clone());
//! let edited = mutate_entry(&flat, "#/name", patch).unwrap();
//!
//! assert_eq!(edited.get("#/name").unwrap().kind, NodeKind::Leaf);
//! assert_eq!(extract_data(&edited), json!({ "name": "Ada" }));
//! ```

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::flatten::{flatten_into, placeholder_items};
use crate::id::{IdAllocator, PathAllocator, allocate_id};
use crate::types::{FlatEntry, FlatMap, Keywords, NodeKind, ROOT_ID, SchemaNode, Slot};
use crate::unflatten::unflatten;

/// Change to a single entry.
///
/// `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    /// Replacement keywords. `properties`, `items` and `$id` are ignored.
    pub schema: Option<Keywords>,
    /// Replacement value; `Some(None)` clears the bound value.
    pub value: Option<Option<Value>>,
    /// New property name (the id is kept).
    pub name: Option<String>,
}

impl EntryPatch {
    /// Patch replacing the keywords.
    pub fn schema(keywords: Keywords) -> Self {
        Self {
            schema: Some(keywords),
            ..Self::default()
        }
    }

    /// Patch setting the bound value.
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(Some(value)),
            ..Self::default()
        }
    }

    /// Patch clearing the bound value.
    pub fn clear_value() -> Self {
        Self {
            value: Some(None),
            ..Self::default()
        }
    }

    /// Patch renaming the property.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Adds a value change to this patch.
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = Some(value);
        self
    }

    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.schema.is_none() && self.value.is_none() && self.name.is_none()
    }
}

/// Replaces one entry and returns the new map.
///
/// A kind change cascades explicitly:
///
/// - to a leaf: all descendants are removed;
/// - to an object: descendants are removed, the child list starts empty and
///   the bound value is cleared;
/// - to an array: descendants are removed and a hidden `{"type": "object"}`
///   item placeholder is created.
///
/// Setting the schema of a hidden placeholder makes it part of the public
/// schema. A value patch is applied as given; shape conflicts are only
/// resolved on the next [`merge_data`](crate::merge_data).
///
/// # Errors
///
/// Returns [`SchemaError::BrokenReference`] for an unknown id, and
/// [`SchemaError::MalformedSchema`] when the root would stop being an object,
/// a value is set on an object, or a rename collides with a sibling.
pub fn mutate_entry(map: &FlatMap, id: &str, patch: EntryPatch) -> Result<FlatMap> {
    let current = map
        .get(id)
        .ok_or_else(|| SchemaError::broken(id, "mutate_entry"))?;
    let mut next = map.clone();
    let mut entry = current.clone();

    if let Some(name) = patch.name {
        if !matches!(entry.slot, Slot::Property(_)) {
            return Err(SchemaError::malformed(id, "only object properties can be renamed"));
        }
        ensure_name_free(map, entry.parent.as_deref().unwrap_or(ROOT_ID), &name, Some(id))?;
        entry.slot = Slot::Property(name);
    }

    if let Some(schema) = patch.schema {
        let schema = strip_structural(schema);
        let kind = NodeKind::from_type(&schema).unwrap_or(entry.kind);
        if id == ROOT_ID && kind != NodeKind::Object {
            return Err(SchemaError::malformed(id, "the root must stay an object"));
        }
        entry.schema = schema;
        if entry.hidden {
            debug!(id, "materializing placeholder entry");
            entry.hidden = false;
        }
        if kind != entry.kind {
            retype(&mut next, &mut entry, kind);
        }
    }

    if let Some(value) = patch.value {
        if entry.kind == NodeKind::Object && value.is_some() {
            return Err(SchemaError::malformed(id, "object entries carry no value"));
        }
        entry.value = value;
    }

    next.insert(entry);
    Ok(next)
}

/// Adds a property under the object `parent` at `index` (appended when
/// `None` or out of range) and returns the new map and the new entry's id.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`] if `parent` is not an object or
/// already has a property `name`, and [`SchemaError::BrokenReference`] if
/// `parent` is missing.
pub fn insert_property(
    map: &FlatMap,
    parent: &str,
    name: &str,
    node: &SchemaNode,
    index: Option<usize>,
) -> Result<(FlatMap, String)> {
    insert_property_with(map, parent, name, node, index, &mut PathAllocator::default())
}

/// [`insert_property`] naming the new entries with `allocator`.
///
/// # Errors
///
/// Same as [`insert_property`], plus [`SchemaError::DuplicateIdentifier`]
/// if `allocator` returns an id already in use.
pub fn insert_property_with(
    map: &FlatMap,
    parent: &str,
    name: &str,
    node: &SchemaNode,
    index: Option<usize>,
    allocator: &mut dyn IdAllocator,
) -> Result<(FlatMap, String)> {
    let owner = map
        .get(parent)
        .ok_or_else(|| SchemaError::broken(parent, "insert_property"))?;
    if owner.kind != NodeKind::Object {
        return Err(SchemaError::malformed(parent, "properties can only be added to objects"));
    }
    ensure_name_free(map, parent, name, None)?;

    let (mut next, id) = flatten_into(
        map.clone(),
        node,
        parent,
        Slot::Property(name.to_string()),
        allocator,
    )?;
    next.update(parent, |owner| {
        let at = index.unwrap_or(owner.children.len()).min(owner.children.len());
        owner.children.insert(at, id.clone());
    });
    Ok((next, id))
}

/// Removes a property and all of its descendants.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`] for the root or an array's item
/// schema (change the array's type instead), and
/// [`SchemaError::BrokenReference`] for an unknown id.
pub fn remove_entry(map: &FlatMap, id: &str) -> Result<FlatMap> {
    let entry = map
        .get(id)
        .ok_or_else(|| SchemaError::broken(id, "remove_entry"))?;
    let parent = match (&entry.slot, &entry.parent) {
        (Slot::Property(_), Some(parent)) => parent.clone(),
        _ => return Err(SchemaError::malformed(id, "only object properties can be removed")),
    };

    let mut next = map.clone();
    next.update(&parent, |owner| owner.children.retain(|child| child != id));
    next.remove_subtree(id);
    Ok(next)
}

/// Moves a property under `new_parent` at `index` (appended when `None` or
/// out of range). Ids are kept; only parent and child lists change.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`] if the entry is not a property,
/// the target is not an object, the target is the entry itself or one of its
/// descendants, or the target already has a property with the same name.
pub fn move_entry(map: &FlatMap, id: &str, new_parent: &str, index: Option<usize>) -> Result<FlatMap> {
    let entry = map
        .get(id)
        .ok_or_else(|| SchemaError::broken(id, "move_entry"))?;
    let (name, old_parent) = match (&entry.slot, &entry.parent) {
        (Slot::Property(name), Some(parent)) => (name.clone(), parent.clone()),
        _ => return Err(SchemaError::malformed(id, "only object properties can be moved")),
    };
    let target = map
        .get(new_parent)
        .ok_or_else(|| SchemaError::broken(new_parent, "move_entry"))?;
    if target.kind != NodeKind::Object {
        return Err(SchemaError::malformed(new_parent, "properties can only move into objects"));
    }
    if new_parent == id || map.descendants(id).iter().any(|d| d == new_parent) {
        return Err(SchemaError::malformed(id, "cannot move an entry into itself"));
    }
    if old_parent != new_parent {
        ensure_name_free(map, new_parent, &name, Some(id))?;
    }

    let mut next = map.clone();
    next.update(&old_parent, |owner| owner.children.retain(|child| child != id));
    next.update(new_parent, |owner| {
        let at = index.unwrap_or(owner.children.len()).min(owner.children.len());
        owner.children.insert(at, id.to_string());
    });
    next.update(id, |moved| moved.parent = Some(new_parent.to_string()));
    Ok(next)
}

/// Copies a property subtree next to the original under a fresh name
/// (`name_copy`, `name_copy_1`, ...) with fresh ids. Bound values are not
/// copied.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`] if the entry is not a property,
/// and any reconstruction error of the subtree.
pub fn duplicate_entry(map: &FlatMap, id: &str) -> Result<(FlatMap, String)> {
    duplicate_entry_with(map, id, &mut PathAllocator::default())
}

/// [`duplicate_entry`] naming the copied entries with `allocator`.
///
/// # Errors
///
/// Same as [`duplicate_entry`], plus [`SchemaError::DuplicateIdentifier`]
/// if `allocator` returns an id already in use.
pub fn duplicate_entry_with(
    map: &FlatMap,
    id: &str,
    allocator: &mut dyn IdAllocator,
) -> Result<(FlatMap, String)> {
    let entry = map
        .get(id)
        .ok_or_else(|| SchemaError::broken(id, "duplicate_entry"))?;
    let (name, parent) = match (&entry.slot, &entry.parent) {
        (Slot::Property(name), Some(parent)) => (name.clone(), parent.clone()),
        _ => return Err(SchemaError::malformed(id, "only object properties can be duplicated")),
    };

    let subtree = unflatten(map, id, false)?;
    let base = format!("{name}_copy");
    let copy_name = (0..)
        .map(|n| if n == 0 { base.clone() } else { format!("{base}_{n}") })
        .find(|candidate| map.child_named(&parent, candidate).is_none())
        .unwrap_or_else(|| base.clone());
    let index = map
        .get(&parent)
        .and_then(|owner| owner.children.iter().position(|child| child == id))
        .map(|at| at + 1);
    insert_property_with(map, &parent, &copy_name, &subtree, index, allocator)
}

fn ensure_name_free(map: &FlatMap, parent: &str, name: &str, except: Option<&str>) -> Result<()> {
    match map.child_named(parent, name) {
        Some(existing) if Some(existing.id.as_str()) != except => Err(SchemaError::malformed(
            parent,
            format!("a property named `{name}` already exists"),
        )),
        _ => Ok(()),
    }
}

fn strip_structural(schema: Keywords) -> Keywords {
    schema
        .into_iter()
        .filter(|(key, _)| {
            let structural = matches!(key.as_str(), "properties" | "items" | "$id");
            if structural {
                debug!(key = %key, "ignoring structural keyword in entry patch");
            }
            !structural
        })
        .collect()
}

fn retype(next: &mut FlatMap, entry: &mut FlatEntry, kind: NodeKind) {
    for child in std::mem::take(&mut entry.children) {
        next.remove_subtree(&child);
    }
    debug!(id = %entry.id, from = ?entry.kind, to = ?kind, "entry kind changed");
    entry.kind = kind;
    entry.present = false;
    match kind {
        NodeKind::Leaf => {}
        NodeKind::Object => entry.value = None,
        NodeKind::Array => {
            let items = placeholder_items();
            let id = allocate_id(next, &entry.id, &Slot::Items);
            next.insert(FlatEntry {
                id: id.clone(),
                parent: Some(entry.id.clone()),
                kind: items.kind(),
                slot: Slot::Items,
                schema: items.keywords,
                children: Vec::new(),
                hidden: true,
                value: None,
                present: false,
            });
            entry.children.push(id);
        }
    }
}
