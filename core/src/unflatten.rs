//! Flat map to schema tree reconstruction.
//!
//! The public form (`include_hidden = false`) is what a host persists: hidden
//! placeholders are left out and no `$id`s are emitted. The internal form
//! (`include_hidden = true`) keeps placeholders and tags every node with its
//! `$id`, so flattening it again yields the same ids.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::types::{FlatEntry, FlatMap, NodeKind, SchemaNode, Shape, Slot};

/// Rebuilds the schema tree rooted at `root_id`.
///
/// # Errors
///
/// Returns [`SchemaError::BrokenReference`] if `root_id` or any recorded
/// child id is missing, or a child sits in the wrong slot for its parent,
/// and [`SchemaError::MalformedSchema`] if child lists form a cycle.
///
/// # Examples
///
/// ```
/// use form_schema_core::*;
/// use serde_json::json;
///
/// let doc = json!({
///     "type": "object",
///     "properties": { "a": { "type": "string" }, "b": { "type": "number" } }
/// });
/// let flat = flatten_value(&doc).unwrap();
/// let rebuilt = unflatten(&flat, ROOT_ID, false).unwrap();
/// assert_eq!(rebuilt.to_value(), doc);
/// ```
pub fn unflatten(map: &FlatMap, root_id: &str, include_hidden: bool) -> Result<SchemaNode> {
    let root = map
        .get(root_id)
        .ok_or_else(|| SchemaError::broken(root_id, "unflatten"))?;
    let mut builder = Builder {
        map,
        include_hidden,
        visiting: HashSet::new(),
    };
    builder.build(root)
}

/// Rebuilds the schema tree rooted at `root_id` as a JSON document.
///
/// # Errors
///
/// Same as [`unflatten`].
pub fn unflatten_value(map: &FlatMap, root_id: &str, include_hidden: bool) -> Result<Value> {
    unflatten(map, root_id, include_hidden).map(|node| node.to_value())
}

struct Builder<'a> {
    map: &'a FlatMap,
    include_hidden: bool,
    visiting: HashSet<&'a str>,
}

impl<'a> Builder<'a> {
    fn build(&mut self, entry: &'a FlatEntry) -> Result<SchemaNode> {
        if !self.visiting.insert(entry.id.as_str()) {
            return Err(SchemaError::malformed(&entry.id, "child lists form a cycle"));
        }

        let shape = match entry.kind {
            NodeKind::Leaf => Shape::Leaf,
            NodeKind::Object => {
                let mut properties = IndexMap::with_capacity(entry.children.len());
                for child in self.children(entry)? {
                    let Slot::Property(name) = &child.slot else {
                        return Err(SchemaError::broken(&child.id, format!("object `{}`", entry.id)));
                    };
                    properties.insert(name.clone(), self.build(child)?);
                }
                Shape::Object(properties)
            }
            NodeKind::Array => {
                let mut items = None;
                for child in self.children(entry)? {
                    if child.slot != Slot::Items {
                        return Err(SchemaError::broken(&child.id, format!("array `{}`", entry.id)));
                    }
                    items = Some(Box::new(self.build(child)?));
                }
                Shape::Array(items)
            }
        };

        self.visiting.remove(entry.id.as_str());
        Ok(SchemaNode {
            id: self.include_hidden.then(|| entry.id.clone()),
            keywords: entry.schema.clone(),
            shape,
        })
    }

    /// Resolves the child ids of `entry`, skipping hidden ones in the public form.
    fn children(&self, entry: &'a FlatEntry) -> Result<Vec<&'a FlatEntry>> {
        let mut resolved = Vec::with_capacity(entry.children.len());
        for id in &entry.children {
            let child = self
                .map
                .get(id)
                .ok_or_else(|| SchemaError::broken(id, format!("`{}`", entry.id)))?;
            if child.hidden && !self.include_hidden {
                continue;
            }
            resolved.push(child);
        }
        Ok(resolved)
    }
}
