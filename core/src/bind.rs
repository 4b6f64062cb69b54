//! Binding form data to a flat map and extracting it back.
//!
//! [`merge_data`] walks the flat map from the root and attaches to each leaf
//! the value found at the same path in the data tree (object property names).
//! Arrays are bound as a whole: the array entry stores the complete array
//! value, with every element pruned to the item schema. Only paths that exist
//! in the flat map are recognized; anything else in the data is dropped.
//!
//! Objects found in the data are marked `present`, so an object that was
//! given empty comes back empty. [`extract_data`] is the inverse walk.
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
//!
//! let bound = merge_data(&flat, &json!({ "name": "Ada", "unknown": 1 }));
//! assert_eq!(bound.get("#/name").unwrap().value, Some(json!("Ada")));
//! assert_eq!(extract_data(&bound), json!({ "name": "Ada" }));
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ValueMismatch, json_kind};
use crate::types::{FlatEntry, FlatMap, Keywords, NodeKind, ROOT_ID, Slot};

/// Attaches the values of `data` to the entries of `map`.
///
/// Values whose shape disagrees with the schema are dropped; see
/// [`merge_data_with_report`] to inspect them.
pub fn merge_data(map: &FlatMap, data: &Value) -> FlatMap {
    merge_data_with_report(map, data).0
}

/// Attaches the values of `data` to the entries of `map`, reporting every
/// value that was dropped because its shape disagreed with the schema.
///
/// Values bound by an earlier merge are cleared first. Missing values leave
/// `value` absent; a partially filled form is a normal state.
pub fn merge_data_with_report(map: &FlatMap, data: &Value) -> (FlatMap, Vec<ValueMismatch>) {
    let mut binder = Binder {
        source: map,
        target: map.clone(),
        mismatches: Vec::new(),
    };
    let bound: Vec<String> = map
        .iter()
        .filter(|entry| entry.value.is_some() || entry.present)
        .map(|entry| entry.id.clone())
        .collect();
    for id in bound {
        binder.target.update(&id, |entry| {
            entry.value = None;
            entry.present = false;
        });
    }

    if let Some(root) = map.root() {
        binder.bind(root, Some(data));
    }
    for mismatch in &binder.mismatches {
        warn!(
            id = %mismatch.id,
            expected = %mismatch.expected,
            found = mismatch.found,
            "dropping form value that does not match the schema"
        );
    }
    (binder.target, binder.mismatches)
}

/// Builds the nested data tree from the values bound in `map`.
///
/// Objects produce objects of their children's values in schema order;
/// children without a value are omitted, and so are nested objects that hold
/// no data and were not present in the bound data. The root always yields an
/// object.
pub fn extract_data(map: &FlatMap) -> Value {
    let mut visiting = HashSet::new();
    map.root()
        .and_then(|root| extract_entry(map, root, &mut visiting))
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn extract_entry<'m>(map: &'m FlatMap, entry: &'m FlatEntry, visiting: &mut HashSet<&'m str>) -> Option<Value> {
    if entry.hidden {
        return None;
    }
    match entry.kind {
        NodeKind::Leaf | NodeKind::Array => entry.value.clone(),
        NodeKind::Object => {
            if !visiting.insert(entry.id.as_str()) {
                warn!(id = %entry.id, "skipping entry reached through a cycle during extraction");
                return None;
            }
            let mut object = Map::new();
            for child_id in &entry.children {
                let Some(child) = map.get(child_id) else {
                    warn!(id = %child_id, parent = %entry.id, "skipping missing child during extraction");
                    continue;
                };
                if let (Slot::Property(name), Some(value)) =
                    (&child.slot, extract_entry(map, child, visiting))
                {
                    object.insert(name.clone(), value);
                }
            }
            visiting.remove(entry.id.as_str());
            if object.is_empty() && !entry.present && entry.id != ROOT_ID {
                None
            } else {
                Some(Value::Object(object))
            }
        }
    }
}

struct Binder<'a> {
    source: &'a FlatMap,
    target: FlatMap,
    mismatches: Vec<ValueMismatch>,
}

impl Binder<'_> {
    fn bind(&mut self, entry: &FlatEntry, value: Option<&Value>) {
        if entry.hidden {
            return;
        }
        let value = match value {
            None => return,
            Some(Value::Null) if entry.kind.is_container() => return,
            Some(value) => value,
        };

        match entry.kind {
            NodeKind::Object => {
                let Value::Object(object) = value else {
                    self.mismatch(entry, "object", value);
                    return;
                };
                self.target.update(&entry.id, |target| target.present = true);
                let source = self.source;
                for child_id in &entry.children {
                    let Some(child) = source.get(child_id) else {
                        continue;
                    };
                    if let Slot::Property(name) = &child.slot {
                        self.bind(child, object.get(name));
                    }
                }
            }
            NodeKind::Array => {
                let Value::Array(elements) = value else {
                    self.mismatch(entry, "array", value);
                    return;
                };
                let template = item_template(self.source, entry);
                let pruned: Vec<Value> = elements
                    .iter()
                    .filter_map(|element| match template {
                        Some(template) => self.prune(template, element),
                        None => Some(element.clone()),
                    })
                    .collect();
                self.target
                    .update(&entry.id, |target| target.value = Some(Value::Array(pruned)));
            }
            NodeKind::Leaf => {
                if let Some(expected) = leaf_type_mismatch(&entry.schema, value) {
                    self.mismatch(entry, &expected, value);
                    return;
                }
                self.target
                    .update(&entry.id, |target| target.value = Some(value.clone()));
            }
        }
    }

    /// Reduces an array element to the parts described by `template`.
    ///
    /// Returns `None` when the element itself does not match, which removes it
    /// from the array and closes the gap.
    fn prune(&mut self, template: &FlatEntry, element: &Value) -> Option<Value> {
        match template.kind {
            NodeKind::Leaf => match leaf_type_mismatch(&template.schema, element) {
                Some(expected) => {
                    self.mismatch(template, &expected, element);
                    None
                }
                None => Some(element.clone()),
            },
            NodeKind::Object => {
                let Value::Object(object) = element else {
                    self.mismatch(template, "object", element);
                    return None;
                };
                let source = self.source;
                let mut pruned = Map::new();
                for child_id in &template.children {
                    let Some(child) = source.get(child_id) else {
                        continue;
                    };
                    let (Slot::Property(name), false) = (&child.slot, child.hidden) else {
                        continue;
                    };
                    let Some(value) = object.get(name) else {
                        continue;
                    };
                    if let Some(value) = self.prune(child, value) {
                        pruned.insert(name.clone(), value);
                    }
                }
                Some(Value::Object(pruned))
            }
            NodeKind::Array => {
                let Value::Array(elements) = element else {
                    self.mismatch(template, "array", element);
                    return None;
                };
                let nested = item_template(self.source, template);
                Some(Value::Array(
                    elements
                        .iter()
                        .filter_map(|element| match nested {
                            Some(nested) => self.prune(nested, element),
                            None => Some(element.clone()),
                        })
                        .collect(),
                ))
            }
        }
    }

    fn mismatch(&mut self, entry: &FlatEntry, expected: &str, found: &Value) {
        self.mismatches.push(ValueMismatch {
            id: entry.id.clone(),
            expected: expected.to_string(),
            found: json_kind(found),
        });
    }
}

/// Non-hidden item schema of an array entry.
fn item_template<'m>(map: &'m FlatMap, array: &FlatEntry) -> Option<&'m FlatEntry> {
    array
        .children
        .iter()
        .filter_map(|id| map.get(id))
        .find(|child| child.slot == Slot::Items && !child.hidden)
}

/// Checks a leaf value against the declared JSON `type`, returning the
/// expected type on mismatch. `null` and undeclared types accept anything.
fn leaf_type_mismatch(schema: &Keywords, value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let declared: Vec<&str> = match schema.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    let known: Vec<&str> = declared.into_iter().filter(|ty| is_json_type(ty)).collect();
    if known.is_empty() || known.iter().any(|ty| accepts(ty, value)) {
        None
    } else {
        Some(known.join("|"))
    }
}

fn is_json_type(ty: &str) -> bool {
    matches!(ty, "string" | "number" | "integer" | "boolean" | "null" | "object" | "array")
}

fn accepts(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}
