//! The editing session: one schema, its form data, and change notifications.
//!
//! An [`EditorSession`] owns the current [`FlatMap`] and replaces it with
//! the map returned by each operation. Failed operations are logged and
//! leave the previous map in place. Hosts learn about changes by calling
//! [`flush`](EditorSession::flush) once per update cycle; edits made in
//! between coalesce into at most one notification per kind.
//!
//! # Example
//!
//! ```
//! use form_schema_core::EntryPatch;
//! use form_schema_session::{EditorConfig, EditorSession, Notification};
//! use serde_json::json;
//!
//! let mut session = EditorSession::new(EditorConfig::default());
//! session
//!     .load(&json!({
//!         "type": "object",
//!         "properties": { "name": { "type": "string" } }
//!     }))
//!     .unwrap();
//! session.flush();
//!
//! session.update_entry("#/name", EntryPatch::value(json!("Ada"))).unwrap();
//! session.update_entry("#/name", EntryPatch::value(json!("Grace"))).unwrap();
//!
//! // The schema did not change; the data did, once.
//! assert_eq!(
//!     session.flush(),
//!     vec![Notification::DataChanged(json!({ "name": "Grace" }))]
//! );
//! ```

use form_schema_core::{
    DeferredQueue, EntryPatch, FlatMap, FlattenOptions, IdAllocator, IdentityTransformer,
    PathAllocator, ROOT_ID, SchemaNode, SchemaTransformer, SchemaVersion, ValueMismatch,
    combine_form_props, duplicate_entry_with, extract_data, flatten, flatten_with,
    insert_property_with, merge_data_with_report, move_entry, mutate_entry, normalize_document, remove_entry, to_legacy,
    unflatten,
};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::config::EditorConfig;
use crate::document::fingerprint;
use crate::error::Result;

/// Change reported to the host by [`EditorSession::flush`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The exported schema changed; carries the new export.
    SchemaChanged(Value),
    /// The form data changed; carries the new data.
    DataChanged(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Topic {
    Schema,
    Data,
}

/// Editing state for one schema document.
pub struct EditorSession {
    config: EditorConfig,
    transformer: Box<dyn SchemaTransformer>,
    allocator: Box<dyn IdAllocator + Send>,
    flat: FlatMap,
    form_props: Map<String, Value>,
    version: SchemaVersion,
    selected: Option<String>,
    pending: DeferredQueue<Topic, (Topic, FlatMap)>,
    last_schema: Option<String>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("config", &self.config)
            .field("entries", &self.flat.len())
            .field("version", &self.version)
            .field("selected", &self.selected)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Creates a session holding the configured default schema.
    pub fn new(config: EditorConfig) -> Self {
        let mut session = Self {
            config,
            transformer: Box::new(IdentityTransformer),
            allocator: Box::new(PathAllocator::default()),
            flat: FlatMap::default(),
            form_props: Map::new(),
            version: SchemaVersion::Current,
            selected: None,
            pending: DeferredQueue::new(),
            last_schema: None,
        };
        session.flat = session.default_flat();
        session
    }

    /// Uses `transformer` for documents crossing the session boundary.
    pub fn with_transformer(mut self, transformer: impl SchemaTransformer + 'static) -> Self {
        self.transformer = Box::new(transformer);
        self
    }

    /// Uses `allocator` to name entries of loaded schemas and of properties
    /// added or duplicated afterwards.
    pub fn with_allocator(mut self, allocator: impl IdAllocator + Send + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Replaces the session's schema (and any embedded `formData`).
    ///
    /// The document goes through the transformer and the version normalizer
    /// first. Selection is cleared and both notifications are scheduled.
    ///
    /// # Errors
    ///
    /// Returns the parse or flatten error. The session then holds the
    /// default schema instead, so the editor stays usable.
    pub fn load(&mut self, document: &Value) -> Result<()> {
        let imported = self.transformer.import_schema(document.clone());
        let normalized = normalize_document(&imported);
        let options = FlattenOptions {
            resolve_refs: self.config.resolve_refs,
        };
        let result = SchemaNode::from_value(&normalized.schema)
            .and_then(|schema| flatten_with(&schema, self.allocator.as_mut(), &options));

        self.selected = None;
        self.last_schema = None;
        let outcome = match result {
            Ok(flat) => {
                debug!(version = ?normalized.version, entries = flat.len(), "loaded schema");
                self.flat = flat;
                self.form_props = normalized.form_props;
                self.version = normalized.version;
                if let Some(data) = &normalized.form_data {
                    self.bind(data);
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to load schema, falling back to the default");
                self.flat = self.default_flat();
                self.form_props = Map::new();
                self.version = SchemaVersion::Current;
                Err(e.into())
            }
        };
        self.schedule(Topic::Schema);
        self.schedule(Topic::Data);
        outcome
    }

    /// Binds new form data, returning the values the schema rejected.
    pub fn set_form_data(&mut self, data: &Value) -> Vec<ValueMismatch> {
        let mismatches = self.bind(data);
        self.schedule(Topic::Data);
        mismatches
    }

    /// Applies `patch` to entry `id`.
    ///
    /// # Errors
    ///
    /// Returns the rejection; the session keeps its previous state.
    pub fn update_entry(&mut self, id: &str, patch: EntryPatch) -> Result<()> {
        self.apply("update_entry", |flat, _| mutate_entry(flat, id, patch).map(|next| (next, ())))
    }

    /// Adds a property under `parent`, returning the new entry's id.
    ///
    /// # Errors
    ///
    /// Returns the rejection; the session keeps its previous state.
    pub fn insert_property(
        &mut self,
        parent: &str,
        name: &str,
        node: &SchemaNode,
        index: Option<usize>,
    ) -> Result<String> {
        self.apply("insert_property", |flat, allocator| {
            insert_property_with(flat, parent, name, node, index, allocator)
        })
    }

    /// Removes a property and its descendants.
    ///
    /// # Errors
    ///
    /// Returns the rejection; the session keeps its previous state.
    pub fn remove_entry(&mut self, id: &str) -> Result<()> {
        self.apply("remove_entry", |flat, _| remove_entry(flat, id).map(|next| (next, ())))
    }

    /// Moves a property under `new_parent` at `index`.
    ///
    /// # Errors
    ///
    /// Returns the rejection; the session keeps its previous state.
    pub fn move_entry(&mut self, id: &str, new_parent: &str, index: Option<usize>) -> Result<()> {
        self.apply("move_entry", |flat, _| {
            move_entry(flat, id, new_parent, index).map(|next| (next, ()))
        })
    }

    /// Copies a property next to itself, returning the copy's id.
    ///
    /// # Errors
    ///
    /// Returns the rejection; the session keeps its previous state.
    pub fn duplicate_entry(&mut self, id: &str) -> Result<String> {
        self.apply("duplicate_entry", |flat, allocator| duplicate_entry_with(flat, id, allocator))
    }

    /// Selects entry `id`. Returns `false` (and keeps the selection) if it
    /// does not exist.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.flat.contains(id) {
            return false;
        }
        self.selected = Some(id.to_string());
        true
    }

    /// Currently selected entry.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Current flat map.
    pub fn flat(&self) -> &FlatMap {
        &self.flat
    }

    /// Form-level props loaded alongside the schema.
    pub fn form_props(&self) -> &Map<String, Value> {
        &self.form_props
    }

    /// Convention the current schema was loaded in.
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// The schema as the host should persist it.
    ///
    /// # Errors
    ///
    /// Returns a reconstruction error if the map is inconsistent.
    pub fn schema(&self) -> Result<Value> {
        self.export(&self.flat)
    }

    /// The schema as the editor displays it: hidden placeholders included,
    /// `$id`s on every node unless `hide_id` is set, form props folded into
    /// the root.
    ///
    /// # Errors
    ///
    /// Returns a reconstruction error if the map is inconsistent.
    pub fn display_schema(&self) -> Result<Value> {
        let mut node = unflatten(&self.flat, ROOT_ID, true)?;
        if self.config.hide_id {
            node.clear_ids();
        }
        Ok(combine_form_props(&node.to_value(), &self.form_props))
    }

    /// Current form data.
    pub fn form_data(&self) -> Value {
        extract_data(&self.flat)
    }

    /// Drains pending notifications.
    ///
    /// A schema notification is dropped when the export is identical to the
    /// last one reported.
    pub fn flush(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for (topic, snapshot) in self.pending.drain() {
            match topic {
                Topic::Data => notifications.push(Notification::DataChanged(extract_data(&snapshot))),
                Topic::Schema => match self.export(&snapshot) {
                    Ok(schema) => {
                        let digest = fingerprint(&schema);
                        if self.last_schema.as_deref() == Some(digest.as_str()) {
                            debug!("schema unchanged, skipping notification");
                            continue;
                        }
                        self.last_schema = Some(digest);
                        notifications.push(Notification::SchemaChanged(schema));
                    }
                    Err(e) => error!(error = %e, "failed to export schema for notification"),
                },
            }
        }
        notifications
    }

    fn apply<T, F>(&mut self, operation: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&FlatMap, &mut dyn IdAllocator) -> form_schema_core::Result<(FlatMap, T)>,
    {
        let allocator: &mut dyn IdAllocator = self.allocator.as_mut();
        match edit(&self.flat, allocator) {
            Ok((next, output)) => {
                self.flat = next;
                // Edits can drop the selected entry (removal, kind change).
                if self.selected.as_deref().is_some_and(|id| !self.flat.contains(id)) {
                    self.selected = None;
                }
                self.schedule(Topic::Schema);
                self.schedule(Topic::Data);
                Ok(output)
            }
            Err(e) => {
                error!(operation, error = %e, "rejected schema edit");
                Err(e.into())
            }
        }
    }

    fn bind(&mut self, data: &Value) -> Vec<ValueMismatch> {
        let (next, mismatches) = merge_data_with_report(&self.flat, data);
        self.flat = next;
        mismatches
    }

    fn schedule(&mut self, topic: Topic) {
        self.pending.schedule(topic, (topic, self.flat.clone()));
    }

    fn export(&self, flat: &FlatMap) -> Result<Value> {
        let schema = unflatten(flat, ROOT_ID, false)?.to_value();
        let document = match (self.config.preserve_version, self.version) {
            (true, SchemaVersion::Legacy) => to_legacy(&schema, &self.form_props),
            (true, SchemaVersion::Wrapped) => {
                let mut wrapped = Map::new();
                wrapped.insert("schema".to_string(), schema);
                wrapped.extend(self.form_props.clone());
                Value::Object(wrapped)
            }
            _ => schema,
        };
        Ok(self.transformer.export_schema(document))
    }

    fn default_flat(&self) -> FlatMap {
        match SchemaNode::from_value(&self.config.default_schema).and_then(|node| flatten(&node)) {
            Ok(flat) => flat,
            Err(e) => {
                warn!(error = %e, "configured default schema is invalid, using an empty object");
                flatten(&SchemaNode::object()).unwrap_or_default()
            }
        }
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use form_schema_core::{LegacyTransformer, NodeKind, SchemaError, fn_allocator};
    use serde_json::json;

    use super::*;

    fn profile() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "address": {
                    "type": "object",
                    "properties": { "city": { "type": "string" } }
                },
                "tags": { "type": "array" }
            }
        })
    }

    fn loaded() -> EditorSession {
        let mut session = EditorSession::default();
        session.load(&profile()).unwrap();
        session.flush();
        session
    }

    #[test]
    fn test_new_session_holds_default_schema() {
        let session = EditorSession::default();
        assert_eq!(session.schema().unwrap(), json!({ "type": "object", "properties": {} }));
        assert_eq!(session.form_data(), json!({}));
    }

    #[test]
    fn test_load_notifies_both() {
        let mut session = EditorSession::default();
        session.load(&profile()).unwrap();
        assert_eq!(
            session.flush(),
            vec![
                Notification::SchemaChanged(profile()),
                Notification::DataChanged(json!({})),
            ]
        );
        assert!(session.flush().is_empty());
    }

    #[test]
    fn test_broken_load_falls_back_to_default() {
        let mut session = loaded();
        session.select("#/name");
        let err = session
            .load(&json!({ "type": "object", "properties": [] }))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::SessionError::Schema(SchemaError::MalformedSchema { .. })
        ));
        assert_eq!(session.schema().unwrap(), json!({ "type": "object", "properties": {} }));
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn test_embedded_form_data_is_bound() {
        let mut session = EditorSession::default();
        session
            .load(&json!({ "schema": profile(), "formData": { "name": "Ada" } }))
            .unwrap();
        assert_eq!(session.version(), SchemaVersion::Wrapped);
        assert_eq!(session.form_data(), json!({ "name": "Ada" }));
    }

    #[test]
    fn test_rapid_edits_coalesce() {
        let mut session = loaded();
        for title in ["A", "B"] {
            let keywords = json!({ "type": "string", "title": title });
            session
                .update_entry("#/name", EntryPatch::schema(keywords.as_object().cloned().unwrap()))
                .unwrap();
        }
        session.update_entry("#/name", EntryPatch::value(json!("Ada"))).unwrap();

        let notifications = session.flush();
        assert_eq!(notifications.len(), 2);
        match &notifications[0] {
            Notification::SchemaChanged(schema) => {
                assert_eq!(schema["properties"]["name"]["title"], "B");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(notifications[1], Notification::DataChanged(json!({ "name": "Ada" })));
    }

    #[test]
    fn test_rejected_edit_keeps_state() {
        let mut session = loaded();
        let before = session.flat().clone();
        assert!(session.update_entry("#/missing", EntryPatch::value(json!(1))).is_err());
        assert!(session.move_entry("#/address", "#/address/city", None).is_err());
        assert_eq!(session.flat(), &before);
        assert!(session.flush().is_empty());
    }

    #[test]
    fn test_remove_clears_selection_inside_subtree() {
        let mut session = loaded();
        assert!(session.select("#/address/city"));
        session.remove_entry("#/address").unwrap();
        assert_eq!(session.selected(), None);
        assert!(!session.select("#/address"));
    }

    #[test]
    fn test_structural_edits() {
        let mut session = loaded();
        let id = session
            .insert_property(ROOT_ID, "email", &SchemaNode::leaf("string"), Some(1))
            .unwrap();
        assert_eq!(id, "#/email");
        let copy = session.duplicate_entry("#/address").unwrap();
        session.move_entry(&copy, "#/address", None).unwrap();

        let schema = session.schema().unwrap();
        let names: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
        assert_eq!(names, ["name", "email", "address", "tags"]);
        assert_eq!(
            schema["properties"]["address"]["properties"]["address_copy"]["properties"]["city"],
            json!({ "type": "string" })
        );
    }

    #[test]
    fn test_display_schema_shows_placeholder_and_ids() {
        let session = loaded();
        let display = session.display_schema().unwrap();
        assert_eq!(display["$id"], "#");
        assert_eq!(display["properties"]["tags"]["items"]["$id"], "#/tags/[]");

        let mut hidden = EditorSession::new(EditorConfig {
            hide_id: true,
            ..EditorConfig::default()
        });
        hidden.load(&profile()).unwrap();
        let display = hidden.display_schema().unwrap();
        assert!(display.get("$id").is_none());
        assert_eq!(display["properties"]["tags"]["items"]["type"], "object");
    }

    #[test]
    fn test_legacy_document_exports_as_legacy() {
        let mut session = EditorSession::default();
        session
            .load(&json!({
                "propsSchema": {
                    "type": "object",
                    "properties": { "bio": { "type": "string" } }
                },
                "uiSchema": { "bio": { "ui:widget": "textarea" } },
                "displayType": "row"
            }))
            .unwrap();

        let exported = session.schema().unwrap();
        assert_eq!(exported["propsSchema"]["properties"]["bio"]["ui:widget"], "textarea");
        assert_eq!(exported["displayType"], "row");
        assert_eq!(session.display_schema().unwrap()["displayType"], "row");

        let mut current = EditorSession::new(EditorConfig {
            preserve_version: false,
            ..EditorConfig::default()
        });
        current.load(&exported).unwrap();
        assert_eq!(current.schema().unwrap()["properties"]["bio"]["widget"], "textarea");
    }

    #[test]
    fn test_transformer_applies_on_export() {
        let mut session = EditorSession::default().with_transformer(LegacyTransformer);
        session.load(&profile()).unwrap();
        assert!(session.schema().unwrap().get("propsSchema").is_some());
    }

    #[test]
    fn test_custom_allocator() {
        let mut next = 0;
        let mut session = EditorSession::default().with_allocator(fn_allocator(move |_| {
            next += 1;
            format!("field-{next}")
        }));
        session.load(&profile()).unwrap();
        assert_eq!(session.flat().get("field-1").unwrap().kind, NodeKind::Leaf);
        assert!(session.flat().contains("field-2"));
    }

    #[test]
    fn test_custom_allocator_names_inserted_entries() {
        let mut next = 0;
        let mut session = EditorSession::default().with_allocator(fn_allocator(move |_| {
            next += 1;
            format!("field-{next}")
        }));
        session.load(&profile()).unwrap();
        let loaded = session.flat().len();

        let id = session
            .insert_property(ROOT_ID, "email", &SchemaNode::leaf("string"), None)
            .unwrap();
        assert_eq!(id, format!("field-{loaded}"));

        let copy = session.duplicate_entry(&id).unwrap();
        assert_eq!(copy, format!("field-{}", loaded + 1));
        session.flat().check().unwrap();
    }

    #[test]
    fn test_set_form_data_reports_mismatches() {
        let mut session = loaded();
        let mismatches = session.set_form_data(&json!({ "name": 5, "address": { "city": "Paris" } }));
        assert_eq!(mismatches.len(), 1);
        assert_eq!(
            session.flush(),
            vec![Notification::DataChanged(json!({ "address": { "city": "Paris" } }))]
        );
    }
}
