//! Schema tree and flat map type definitions.
//!
//! [`SchemaNode`] is the hierarchical, external representation of a form
//! schema. [`FlatMap`] is the flat, addressable representation the editor
//! works on: every node becomes one [`FlatEntry`] keyed by a stable id, and
//! nesting is expressed through `parent`/`children` ids instead of embedded
//! `properties`/`items`.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

/// Id of the root entry of every flat map.
pub const ROOT_ID: &str = "#";

/// A node's own keywords: everything except `properties` and `items`.
pub type Keywords = Map<String, Value>;

const PROPERTIES: &str = "properties";
const ITEMS: &str = "items";
const ID_KEYWORD: &str = "$id";

/// Structural kind of a schema node.
///
/// # Examples
///
/// ```
/// use form_schema_core::{Keywords, NodeKind};
/// use serde_json::json;
///
/// let keywords: Keywords = serde_json::from_value(json!({"type": "array"})).unwrap();
/// assert_eq!(NodeKind::from_type(&keywords), Some(NodeKind::Array));
/// assert!(NodeKind::Array.is_container());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `type: "object"`, children are named properties.
    Object,
    /// `type: "array"`, a single child describes the items.
    Array,
    /// Any other type; terminates recursion.
    Leaf,
}

impl NodeKind {
    /// Kind implied by the `type` keyword, or `None` when `type` is absent
    /// or not a string.
    pub fn from_type(keywords: &Keywords) -> Option<Self> {
        match keywords.get("type")?.as_str()? {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => Some(Self::Leaf),
        }
    }

    /// Returns `true` for objects and arrays.
    pub fn is_container(self) -> bool {
        !matches!(self, Self::Leaf)
    }
}

/// Nested shape of a [`SchemaNode`].
#[derive(Debug, Clone, Default)]
pub enum Shape {
    /// No nested schema.
    #[default]
    Leaf,
    /// Named properties in declaration order.
    Object(IndexMap<String, SchemaNode>),
    /// Item schema shared by every element of the array.
    Array(Option<Box<SchemaNode>>),
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Leaf, Self::Leaf) => true,
            // Property order is part of the schema, so compare in sequence.
            (Self::Object(a), Self::Object(b)) => a.iter().eq(b.iter()),
            (Self::Array(a), Self::Array(b)) => a == b,
            _ => false,
        }
    }
}

/// A node of the hierarchical schema tree.
///
/// The node's own keywords (`type`, `title`, `default`, `widget`, validation
/// rules, extension fields, ...) live in [`keywords`](SchemaNode::keywords);
/// nesting lives in [`shape`](SchemaNode::shape). A `$id` keyword in the JSON
/// form is lifted into [`id`](SchemaNode::id) and requests that identifier
/// when the node is flattened.
///
/// # Examples
///
/// ```
/// use form_schema_core::{NodeKind, SchemaNode};
/// use serde_json::json;
///
/// let schema = SchemaNode::from_value(&json!({
///     "type": "object",
///     "properties": {
///         "name": { "type": "string", "title": "Name" },
///         "tags": { "type": "array", "items": { "type": "string" } }
///     }
/// }))
/// .unwrap();
///
/// assert_eq!(schema.kind(), NodeKind::Object);
/// let names: Vec<&str> = schema.properties().unwrap().keys().map(String::as_str).collect();
/// assert_eq!(names, vec!["name", "tags"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// Requested identifier (`$id`), if any.
    pub id: Option<String>,
    /// Own keywords, excluding `properties`, `items` and `$id`.
    pub keywords: Keywords,
    /// Nested schema.
    pub shape: Shape,
}

impl SchemaNode {
    /// Creates an empty `{"type": "object"}` node.
    pub fn object() -> Self {
        Self {
            id: None,
            keywords: type_keywords("object"),
            shape: Shape::Object(IndexMap::new()),
        }
    }

    /// Creates a `{"type": "array"}` node with the given item schema.
    pub fn array(items: SchemaNode) -> Self {
        Self {
            id: None,
            keywords: type_keywords("array"),
            shape: Shape::Array(Some(Box::new(items))),
        }
    }

    /// Creates a leaf node of the given `type`.
    pub fn leaf(ty: &str) -> Self {
        Self {
            id: None,
            keywords: type_keywords(ty),
            shape: Shape::Leaf,
        }
    }

    /// Adds a property, turning the node into an object shape if needed.
    pub fn with_property(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        match &mut self.shape {
            Shape::Object(properties) => {
                properties.insert(name.into(), node);
            }
            shape => {
                *shape = Shape::Object(IndexMap::from([(name.into(), node)]));
            }
        }
        self
    }

    /// Sets a keyword.
    pub fn with_keyword(mut self, key: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(key.into(), value);
        self
    }

    /// Sets the requested identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Structural kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self.shape {
            Shape::Leaf => NodeKind::Leaf,
            Shape::Object(_) => NodeKind::Object,
            Shape::Array(_) => NodeKind::Array,
        }
    }

    /// Properties of an object node.
    pub fn properties(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match &self.shape {
            Shape::Object(properties) => Some(properties),
            _ => None,
        }
    }

    /// Item schema of an array node.
    pub fn items(&self) -> Option<&SchemaNode> {
        match &self.shape {
            Shape::Array(items) => items.as_deref(),
            _ => None,
        }
    }

    /// Parses a JSON schema document into a node tree.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MalformedSchema`] if a node is not a JSON
    /// object, `properties` or `items` is not object-shaped, `$id` is not a
    /// string, or a leaf-typed node carries `properties`/`items`.
    pub fn from_value(value: &Value) -> Result<Self> {
        parse_node(value, ROOT_ID)
    }

    /// Renders the node tree back into a JSON schema document.
    ///
    /// `$id` is emitted first when present; `properties`/`items` follow the
    /// node's own keywords.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert(ID_KEYWORD.to_string(), Value::String(id.clone()));
        }
        for (key, value) in &self.keywords {
            map.insert(key.clone(), value.clone());
        }
        match &self.shape {
            Shape::Leaf => {}
            Shape::Object(properties) => {
                let rendered = properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_value()))
                    .collect();
                map.insert(PROPERTIES.to_string(), Value::Object(rendered));
            }
            Shape::Array(items) => {
                if let Some(items) = items {
                    map.insert(ITEMS.to_string(), items.to_value());
                }
            }
        }
        Value::Object(map)
    }

    /// Removes requested ids from this node and all descendants.
    pub fn clear_ids(&mut self) {
        self.id = None;
        match &mut self.shape {
            Shape::Leaf => {}
            Shape::Object(properties) => properties.values_mut().for_each(SchemaNode::clear_ids),
            Shape::Array(items) => {
                if let Some(items) = items {
                    items.clear_ids();
                }
            }
        }
    }
}

fn type_keywords(ty: &str) -> Keywords {
    let mut keywords = Keywords::new();
    keywords.insert("type".to_string(), Value::String(ty.to_string()));
    keywords
}

fn parse_node(value: &Value, path: &str) -> Result<SchemaNode> {
    let Value::Object(map) = value else {
        return Err(SchemaError::malformed(path, "schema node must be an object"));
    };

    let mut keywords = Keywords::new();
    let mut id = None;
    for (key, value) in map {
        match key.as_str() {
            PROPERTIES | ITEMS => {}
            ID_KEYWORD => match value {
                Value::String(s) => id = Some(s.clone()),
                _ => return Err(SchemaError::malformed(path, "`$id` must be a string")),
            },
            _ => {
                keywords.insert(key.clone(), value.clone());
            }
        }
    }

    let properties = map.get(PROPERTIES);
    let items = map.get(ITEMS);
    let kind = match NodeKind::from_type(&keywords) {
        Some(kind) => kind,
        None if properties.is_some() => NodeKind::Object,
        None if items.is_some() => NodeKind::Array,
        None => NodeKind::Leaf,
    };

    let shape = match kind {
        NodeKind::Leaf => {
            if properties.is_some() || items.is_some() {
                return Err(SchemaError::malformed(
                    path,
                    "a leaf-typed node cannot declare `properties` or `items`",
                ));
            }
            Shape::Leaf
        }
        NodeKind::Object => {
            let parsed = match properties {
                None => IndexMap::new(),
                Some(Value::Object(properties)) => properties
                    .iter()
                    .map(|(name, child)| {
                        parse_node(child, &format!("{path}/{name}")).map(|node| (name.clone(), node))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?,
                Some(_) => {
                    return Err(SchemaError::malformed(path, "`properties` must be an object"));
                }
            };
            Shape::Object(parsed)
        }
        NodeKind::Array => match items {
            None => Shape::Array(None),
            Some(items) if items.is_object() => {
                Shape::Array(Some(Box::new(parse_node(items, &format!("{path}/[]"))?)))
            }
            Some(_) => {
                return Err(SchemaError::malformed(
                    path,
                    "`items` must be a single schema object",
                ));
            }
        },
    };

    Ok(SchemaNode {
        id,
        keywords,
        shape,
    })
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SchemaNode::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&Value> for SchemaNode {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self> {
        SchemaNode::from_value(value)
    }
}

/// How an entry hangs off its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The root entry.
    Root,
    /// A named property of an object.
    Property(String),
    /// The item schema of an array.
    Items,
}

impl Slot {
    /// Property name, for [`Slot::Property`].
    pub fn name(&self) -> Option<&str> {
        match self {
            Slot::Property(name) => Some(name),
            _ => None,
        }
    }
}

/// One node of a [`FlatMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatEntry {
    /// Same as the map key.
    pub id: String,
    /// Owning entry; `None` only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Structural kind, consistent with `schema.type`.
    pub kind: NodeKind,
    /// Position under the parent.
    pub slot: Slot,
    /// Own keywords, without `properties`/`items`.
    pub schema: Keywords,
    /// Ordered child ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Editor-only placeholder, left out of the public schema.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Bound form value (leaves and arrays).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub value: Option<Value>,
    /// Object that was present, possibly empty, in the last bound data.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub present: bool,
}

/// A present `value` field is bound, even when it is `null`.
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl FlatEntry {
    /// Property name under the parent object, if any.
    pub fn name(&self) -> Option<&str> {
        self.slot.name()
    }

    /// Returns `true` for the root entry.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Flat, ordered map of schema fragments keyed by id.
///
/// Entries are reference counted: cloning a map shares every entry, and
/// operations that change an entry replace only that entry (copy-on-write).
/// A map held by a caller is therefore an immutable snapshot; operations
/// return new maps instead of editing in place.
///
/// # Examples
///
/// ```
/// use form_schema_core::{flatten_value, ROOT_ID};
/// use serde_json::json;
///
/// let flat = flatten_value(&json!({
///     "type": "object",
///     "properties": { "name": { "type": "string" } }
/// }))
/// .unwrap();
///
/// assert_eq!(flat.len(), 2);
/// assert_eq!(flat.root().unwrap().children, vec!["#/name"]);
/// assert_eq!(flat.get("#/name").unwrap().parent.as_deref(), Some(ROOT_ID));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatMap {
    entries: IndexMap<String, Arc<FlatEntry>>,
}

impl FlatMap {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map has no entries (not even a root).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry.
    pub fn get(&self, id: &str) -> Option<&FlatEntry> {
        self.entries.get(id).map(Arc::as_ref)
    }

    /// Looks up the shared handle of an entry.
    pub fn get_shared(&self, id: &str) -> Option<&Arc<FlatEntry>> {
        self.entries.get(id)
    }

    /// Returns `true` if `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// The root entry.
    pub fn root(&self) -> Option<&FlatEntry> {
        self.get(ROOT_ID)
    }

    /// Ids in depth-first pre-order of creation.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in depth-first pre-order of creation.
    pub fn iter(&self) -> impl Iterator<Item = &FlatEntry> {
        self.entries.values().map(Arc::as_ref)
    }

    /// Returns `true` if both maps hold the very same allocation for `id`.
    pub fn shares_entry(&self, other: &FlatMap, id: &str) -> bool {
        match (self.entries.get(id), other.entries.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Finds the child of `parent` holding property `name`.
    pub fn child_named(&self, parent: &str, name: &str) -> Option<&FlatEntry> {
        self.get(parent)?
            .children
            .iter()
            .filter_map(|child| self.get(child))
            .find(|child| child.name() == Some(name))
    }

    /// Resolves a property path (e.g. `["address", "city"]`) from the root.
    pub fn find_path<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<&FlatEntry> {
        let mut current = self.root()?;
        for segment in path {
            current = self.child_named(&current.id, segment)?;
        }
        Some(current)
    }

    /// Ids of every descendant of `id` in pre-order, excluding `id` itself.
    ///
    /// Missing children are skipped, and each id is reported once even if
    /// child lists loop back on themselves.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut stack: Vec<&str> = match self.get(id) {
            Some(entry) => entry.children.iter().rev().map(String::as_str).collect(),
            None => return found,
        };
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(entry) = self.get(current) {
                found.push(current.to_string());
                stack.extend(entry.children.iter().rev().map(String::as_str));
            }
        }
        found
    }

    /// Inserts or replaces an entry, keeping the position of a replaced id.
    pub(crate) fn insert(&mut self, entry: FlatEntry) {
        self.entries.insert(entry.id.clone(), Arc::new(entry));
    }

    /// Edits one entry in place, cloning it first if it is shared.
    pub(crate) fn update<F>(&mut self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut FlatEntry),
    {
        match self.entries.get_mut(id) {
            Some(entry) => {
                edit(Arc::make_mut(entry));
                true
            }
            None => false,
        }
    }

    /// Removes `id` and all of its descendants.
    pub(crate) fn remove_subtree(&mut self, id: &str) -> usize {
        let mut doomed = self.descendants(id);
        doomed.push(id.to_string());
        doomed
            .iter()
            .filter(|id| self.entries.shift_remove(id.as_str()).is_some())
            .count()
    }

    /// Verifies the structural invariants of the map.
    ///
    /// # Errors
    ///
    /// Returns the first problem found by
    /// [`validate_flat_map`](crate::validate_flat_map).
    pub fn check(&self) -> Result<()> {
        match crate::validate::validate_flat_map(self).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl FromIterator<FlatEntry> for FlatMap {
    fn from_iter<I: IntoIterator<Item = FlatEntry>>(iter: I) -> Self {
        let mut map = FlatMap::default();
        for entry in iter {
            map.insert(entry);
        }
        map
    }
}
