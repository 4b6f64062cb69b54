//! Identifier allocation for flat map entries.
//!
//! The default [`PathAllocator`] derives ids from a node's position: the root
//! is `#`, property `name` under `P` is `P/name`, and an array's item schema
//! under `P` is `P/[]`. When a path is already taken (for example after a
//! property was moved away and a new one took its name), the new id gets a
//! numeric suffix one past the largest already in use for that path.
//!
//! Hosts can plug in their own strategy with [`fn_allocator`]. Allocators
//! must return unused ids; the flattener rejects a collision with
//! [`SchemaError::DuplicateIdentifier`](crate::SchemaError::DuplicateIdentifier).

use std::collections::HashMap;

use crate::types::{FlatMap, ROOT_ID, Slot};

/// Where a new entry is being placed.
#[derive(Debug, Clone, Copy)]
pub struct IdRequest<'a> {
    /// Parent id; `None` for the root.
    pub parent: Option<&'a str>,
    /// Slot under the parent.
    pub slot: &'a Slot,
}

impl IdRequest<'_> {
    /// Position-derived id (`#`, `#/name`, `#/list/[]`).
    ///
    /// `/` and `~` in property names are escaped as `~1` and `~0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_schema_core::{IdRequest, Slot};
    ///
    /// let slot = Slot::Property("a/b".into());
    /// let request = IdRequest { parent: Some("#/obj"), slot: &slot };
    /// assert_eq!(request.path(), "#/obj/a~1b");
    /// ```
    pub fn path(&self) -> String {
        let parent = match self.parent {
            Some(parent) => parent,
            None => return ROOT_ID.to_string(),
        };
        match self.slot {
            Slot::Root => ROOT_ID.to_string(),
            Slot::Property(name) => format!("{parent}/{}", escape_segment(name)),
            Slot::Items => format!("{parent}/[]"),
        }
    }
}

fn escape_segment(name: &str) -> String {
    name.replace('~', "~0").replace('/', "~1")
}

/// Strategy for naming new flat map entries.
pub trait IdAllocator {
    /// Returns an id for the entry described by `request`.
    ///
    /// `existing` holds every entry allocated so far.
    fn allocate(&mut self, request: &IdRequest<'_>, existing: &FlatMap) -> String;
}

/// Default position-based allocator.
///
/// # Examples
///
/// ```
/// use form_schema_core::{flatten_value, FlatMap, IdAllocator, IdRequest, PathAllocator, Slot};
/// use serde_json::json;
///
/// let mut allocator = PathAllocator::default();
/// let slot = Slot::Property("name".into());
/// let request = IdRequest { parent: Some("#"), slot: &slot };
/// assert_eq!(allocator.allocate(&request, &FlatMap::default()), "#/name");
///
/// let flat = flatten_value(&json!({
///     "type": "object",
///     "properties": { "name": { "type": "string" } }
/// }))
/// .unwrap();
/// assert_eq!(allocator.allocate(&request, &flat), "#/name_1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PathAllocator {
    next_suffix: HashMap<String, u32>,
}

impl IdAllocator for PathAllocator {
    fn allocate(&mut self, request: &IdRequest<'_>, existing: &FlatMap) -> String {
        let base = request.path();
        if !existing.contains(&base) {
            return base;
        }
        // Suffixes only grow for a given base, so an id handed out earlier is
        // never produced again by this allocator.
        let in_use = largest_suffix(existing, &base).map_or(1, |n| n + 1);
        let counter = self.next_suffix.entry(base.clone()).or_insert(1);
        *counter = (*counter).max(in_use);
        loop {
            let candidate = format!("{base}_{counter}");
            *counter += 1;
            if !existing.contains(&candidate) {
                return candidate;
            }
        }
    }
}

/// Largest `N` among live ids of the form `{base}_{N}`.
fn largest_suffix(existing: &FlatMap, base: &str) -> Option<u32> {
    existing
        .ids()
        .filter_map(|id| id.strip_prefix(base)?.strip_prefix('_')?.parse::<u32>().ok())
        .max()
}

/// Allocator backed by a caller closure (the host's `getId` override).
#[derive(Debug, Clone)]
pub struct FnAllocator<F>(F);

impl<F> IdAllocator for FnAllocator<F>
where
    F: FnMut(&IdRequest<'_>) -> String,
{
    fn allocate(&mut self, request: &IdRequest<'_>, _existing: &FlatMap) -> String {
        (self.0)(request)
    }
}

/// Wraps a closure as an [`IdAllocator`].
///
/// # Examples
///
/// ```
/// use form_schema_core::{fn_allocator, flatten_with, FlattenOptions, SchemaNode};
///
/// let mut counter = 0;
/// let mut allocator = fn_allocator(|_request| {
///     counter += 1;
///     format!("field_{counter}")
/// });
/// let schema = SchemaNode::object().with_property("name", SchemaNode::leaf("string"));
/// let flat = flatten_with(&schema, &mut allocator, &FlattenOptions::default()).unwrap();
/// assert!(flat.contains("field_1"));
/// ```
pub fn fn_allocator<F>(allocate: F) -> FnAllocator<F>
where
    F: FnMut(&IdRequest<'_>) -> String,
{
    FnAllocator(allocate)
}

/// Allocates an id for a new entry under `parent` in an existing map.
pub fn allocate_id(map: &FlatMap, parent: &str, slot: &Slot) -> String {
    let request = IdRequest {
        parent: Some(parent),
        slot,
    };
    PathAllocator::default().allocate(&request, map)
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::types::{FlatEntry, NodeKind};

    fn live(ids: &[&str]) -> FlatMap {
        ids.iter()
            .map(|id| FlatEntry {
                id: id.to_string(),
                parent: None,
                kind: NodeKind::Leaf,
                slot: Slot::Root,
                schema: Map::new(),
                children: Vec::new(),
                hidden: false,
                value: None,
                present: false,
            })
            .collect()
    }

    fn name_under_root(slot: &Slot) -> IdRequest<'_> {
        IdRequest {
            parent: Some("#"),
            slot,
        }
    }

    #[test]
    fn test_root_is_hash() {
        let request = IdRequest {
            parent: None,
            slot: &Slot::Root,
        };
        assert_eq!(request.path(), "#");
    }

    #[test]
    fn test_items_path() {
        let request = IdRequest {
            parent: Some("#/list"),
            slot: &Slot::Items,
        };
        assert_eq!(request.path(), "#/list/[]");
    }

    #[test]
    fn test_suffix_skips_live_ids() {
        let slot = Slot::Property("name".into());
        let existing = live(&["#/name", "#/name_1", "#/name_2"]);
        let id = PathAllocator::default().allocate(&name_under_root(&slot), &existing);
        assert_eq!(id, "#/name_3");
    }

    #[test]
    fn test_suffix_follows_largest_in_use() {
        let slot = Slot::Property("a".into());
        let existing = live(&["#/a", "#/a_2"]);
        assert_eq!(allocate_id(&existing, ROOT_ID, &slot), "#/a_3");
        let id = PathAllocator::default().allocate(&name_under_root(&slot), &existing);
        assert_eq!(id, "#/a_3");
    }

    #[test]
    fn test_suffix_ignores_other_bases() {
        let slot = Slot::Property("a".into());
        let existing = live(&["#/a", "#/ab_7", "#/a_x"]);
        assert_eq!(allocate_id(&existing, ROOT_ID, &slot), "#/a_1");
    }

    #[test]
    fn test_suffix_is_monotonic_per_allocator() {
        let mut allocator = PathAllocator::default();
        let slot = Slot::Property("name".into());
        let existing = live(&["#/name"]);
        let first = allocator.allocate(&name_under_root(&slot), &existing);
        let second = allocator.allocate(&name_under_root(&slot), &existing);
        assert_eq!(first, "#/name_1");
        assert_eq!(second, "#/name_2");
    }
}
