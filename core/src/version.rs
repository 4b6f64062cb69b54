//! Schema document conventions.
//!
//! Documents arrive in one of three shapes:
//!
//! - **legacy**: `{"propsSchema": {...}, "uiSchema": {...}, ...}`, where
//!   editor keywords live in a parallel `uiSchema` tree or carry a `ui:`
//!   prefix;
//! - **wrapped**: `{"schema": {...}, ...}`, the current schema plus
//!   form-level props side by side;
//! - **current**: the schema itself.
//!
//! [`normalize_document`] rewrites any of them into the current convention.
//! Detection is best-effort: a document that looks legacy but cannot be
//! read as such passes through untouched, with a warning, rather than
//! failing the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::SchemaNode;

const PROPS_SCHEMA: &str = "propsSchema";
const UI_SCHEMA: &str = "uiSchema";
const FORM_DATA: &str = "formData";
const SCHEMA: &str = "schema";
const UI_PREFIX: &str = "ui:";

/// Editor keywords written with a `ui:` prefix in the legacy convention.
pub const UI_KEYWORDS: &[&str] = &[
    "widget",
    "hidden",
    "disabled",
    "options",
    "width",
    "labelWidth",
    "displayType",
    "column",
    "className",
    "placeholder",
    "showDescIcon",
];

/// Convention a document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// `propsSchema` + `uiSchema`.
    Legacy,
    /// `schema` + form props.
    Wrapped,
    /// Bare schema.
    Current,
}

/// A document rewritten into the current convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Schema in the current convention.
    pub schema: Value,
    /// Form-level props that travelled next to the schema.
    pub form_props: Map<String, Value>,
    /// Form data embedded in the document (`formData`), if any.
    pub form_data: Option<Value>,
    /// Convention the document was detected as.
    pub version: SchemaVersion,
}

/// Detects the convention of `document` from its top-level marker fields.
///
/// # Examples
///
/// ```
/// use form_schema_core::{detect_version, SchemaVersion};
/// use serde_json::json;
///
/// assert_eq!(detect_version(&json!({ "propsSchema": { "type": "object" } })), SchemaVersion::Legacy);
/// assert_eq!(detect_version(&json!({ "schema": { "type": "object" } })), SchemaVersion::Wrapped);
/// assert_eq!(detect_version(&json!({ "type": "object" })), SchemaVersion::Current);
/// ```
pub fn detect_version(document: &Value) -> SchemaVersion {
    let Value::Object(fields) = document else {
        return SchemaVersion::Current;
    };
    if fields.get(PROPS_SCHEMA).is_some_and(Value::is_object) {
        SchemaVersion::Legacy
    } else if fields.get(SCHEMA).is_some_and(Value::is_object)
        && !fields.contains_key("type")
        && !fields.contains_key("properties")
    {
        SchemaVersion::Wrapped
    } else {
        SchemaVersion::Current
    }
}

/// Rewrites `document` into the current convention.
///
/// # Examples
///
/// ```
/// use form_schema_core::{normalize_document, SchemaVersion};
/// use serde_json::json;
///
/// let doc = normalize_document(&json!({
///     "propsSchema": {
///         "type": "object",
///         "properties": { "name": { "type": "string" } }
///     },
///     "uiSchema": { "name": { "ui:widget": "textarea" } },
///     "displayType": "row"
/// }));
///
/// assert_eq!(doc.version, SchemaVersion::Legacy);
/// assert_eq!(doc.schema["properties"]["name"]["widget"], "textarea");
/// assert_eq!(doc.form_props["displayType"], "row");
/// ```
pub fn normalize_document(document: &Value) -> NormalizedDocument {
    let version = detect_version(document);
    let fields = match document {
        Value::Object(fields) if version != SchemaVersion::Current => fields,
        _ => {
            if let Some(props) = document.get(PROPS_SCHEMA) {
                warn!(found = %crate::error::json_kind(props), "propsSchema is not an object, passing document through");
            }
            return NormalizedDocument {
                schema: document.clone(),
                form_props: Map::new(),
                form_data: None,
                version,
            };
        }
    };

    let mut form_props = Map::new();
    let mut form_data = None;
    for (key, value) in fields {
        match key.as_str() {
            PROPS_SCHEMA | UI_SCHEMA if version == SchemaVersion::Legacy => {}
            SCHEMA if version == SchemaVersion::Wrapped => {}
            FORM_DATA => form_data = Some(value.clone()),
            _ => {
                let key = key.strip_prefix(UI_PREFIX).unwrap_or(key);
                form_props.insert(key.to_string(), value.clone());
            }
        }
    }

    let schema = match version {
        SchemaVersion::Legacy => {
            let mut schema = fields.get(PROPS_SCHEMA).cloned().unwrap_or(Value::Null);
            if let Some(ui) = fields.get(UI_SCHEMA) {
                merge_ui_schema(&mut schema, ui);
            }
            strip_ui_prefixes(&mut schema);
            schema
        }
        _ => fields.get(SCHEMA).cloned().unwrap_or(Value::Null),
    };
    debug!(?version, form_props = form_props.len(), "normalized schema document");

    NormalizedDocument {
        schema,
        form_props,
        form_data,
        version,
    }
}

/// Normalizes `document` and parses the resulting schema.
///
/// Form-level props are dropped; use [`normalize_document`] to keep them.
///
/// # Errors
///
/// Returns [`SchemaError::MalformedSchema`](crate::SchemaError::MalformedSchema)
/// if the normalized schema is not a valid schema tree.
pub fn normalize_version(document: &Value) -> Result<SchemaNode> {
    SchemaNode::from_value(&normalize_document(document).schema)
}

/// Exports a current schema in the legacy convention.
///
/// Editor keywords ([`UI_KEYWORDS`]) get their `ui:` prefix back and form
/// props are placed next to `propsSchema`.
///
/// # Examples
///
/// ```
/// use form_schema_core::to_legacy;
/// use serde_json::{json, Map};
///
/// let legacy = to_legacy(
///     &json!({ "type": "object", "properties": { "bio": { "type": "string", "widget": "textarea" } } }),
///     &Map::new(),
/// );
/// assert_eq!(legacy["propsSchema"]["properties"]["bio"]["ui:widget"], "textarea");
/// ```
pub fn to_legacy(schema: &Value, form_props: &Map<String, Value>) -> Value {
    let mut props_schema = schema.clone();
    add_ui_prefixes(&mut props_schema);

    let mut document = Map::new();
    document.insert(PROPS_SCHEMA.to_string(), props_schema);
    for (key, value) in form_props {
        document.insert(key.clone(), value.clone());
    }
    Value::Object(document)
}

/// Folds form-level props into the root keywords of `schema`.
///
/// Form props win over root keywords of the same name. A non-object schema
/// is returned unchanged.
pub fn combine_form_props(schema: &Value, form_props: &Map<String, Value>) -> Value {
    let mut combined = schema.clone();
    if let Value::Object(root) = &mut combined {
        for (key, value) in form_props {
            root.insert(key.clone(), value.clone());
        }
    }
    combined
}

/// Merges a legacy `uiSchema` tree into the schema it annotates.
///
/// Keywords already on the schema win over `uiSchema` ones.
fn merge_ui_schema(schema: &mut Value, ui: &Value) {
    let (Value::Object(node), Value::Object(ui)) = (schema, ui) else {
        return;
    };
    for (key, value) in ui {
        if let Some(keyword) = key.strip_prefix(UI_PREFIX) {
            if !node.contains_key(keyword) {
                node.insert(keyword.to_string(), value.clone());
            }
        } else if key == "items" {
            if let Some(items) = node.get_mut("items") {
                merge_ui_schema(items, value);
            }
        } else if let Some(property) = node
            .get_mut("properties")
            .and_then(|properties| properties.get_mut(key))
        {
            merge_ui_schema(property, value);
        } else {
            debug!(key = %key, "ignoring uiSchema entry without a matching property");
        }
    }
}

/// Renames `ui:`-prefixed keywords throughout a schema tree. Existing
/// unprefixed keywords win.
fn strip_ui_prefixes(schema: &mut Value) {
    let Value::Object(node) = schema else {
        return;
    };
    if node.keys().any(|key| key.starts_with(UI_PREFIX)) {
        let mut renamed = Map::with_capacity(node.len());
        for (key, value) in std::mem::take(node) {
            match key.strip_prefix(UI_PREFIX) {
                Some(keyword) if !renamed.contains_key(keyword) => {
                    renamed.insert(keyword.to_string(), value);
                }
                Some(_) => {}
                None => {
                    renamed.insert(key, value);
                }
            }
        }
        *node = renamed;
    }
    visit_children(node, strip_ui_prefixes);
}

fn add_ui_prefixes(schema: &mut Value) {
    let Value::Object(node) = schema else {
        return;
    };
    if node.keys().any(|key| UI_KEYWORDS.contains(&key.as_str())) {
        *node = std::mem::take(node)
            .into_iter()
            .map(|(key, value)| {
                if UI_KEYWORDS.contains(&key.as_str()) {
                    (format!("{UI_PREFIX}{key}"), value)
                } else {
                    (key, value)
                }
            })
            .collect();
    }
    visit_children(node, add_ui_prefixes);
}

fn visit_children(node: &mut Map<String, Value>, visit: fn(&mut Value)) {
    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        properties.values_mut().for_each(visit);
    }
    if let Some(items) = node.get_mut("items") {
        visit(items);
    }
}
