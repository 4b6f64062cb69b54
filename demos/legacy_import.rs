//! Importing and exporting legacy documents.
//!
//! Writes a small library of schemas in the three accepted conventions,
//! loads each into a session, and shows that exports keep the convention
//! the document arrived in unless `preserve_version` is turned off.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p form-schema-demos --example legacy_import
//! ```

use form_schema_core::detect_version;
use form_schema_session::{EditorConfig, EditorSession, SchemaLibrary, save_document};
use serde_json::json;

fn main() {
    let dir = std::env::temp_dir().join("form_schema_demo_library");
    std::fs::create_dir_all(&dir).unwrap();

    save_document(
        dir.join("legacy.json"),
        &json!({
            "propsSchema": {
                "type": "object",
                "properties": {
                    "bio": { "type": "string", "title": "Bio" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            },
            "uiSchema": { "bio": { "ui:widget": "textarea" } },
            "formData": { "bio": "Hello", "tags": ["a", "b"] },
            "column": 2
        }),
    )
    .unwrap();
    save_document(
        dir.join("wrapped.yaml"),
        &json!({
            "schema": {
                "type": "object",
                "properties": { "agree": { "type": "boolean", "title": "I agree" } }
            },
            "displayType": "row"
        }),
    )
    .unwrap();
    save_document(
        dir.join("current.json"),
        &json!({
            "type": "object",
            "properties": { "email": { "type": "string", "widget": "email" } }
        }),
    )
    .unwrap();

    let library = SchemaLibrary::from_dir(&dir).unwrap();
    println!("Loaded {} documents from {}", library.len(), dir.display());
    println!();

    for preserve_version in [true, false] {
        println!("== preserve_version: {preserve_version}");
        let mut session = EditorSession::new(EditorConfig {
            preserve_version,
            ..EditorConfig::default()
        });
        for name in library.names() {
            let Some(document) = library.get(name) else {
                continue;
            };
            session.load(document).unwrap();
            let exported = session.schema().unwrap();
            println!("{name} ({:?} -> {:?})", session.version(), detect_version(&exported));
            println!("  export:    {exported}");
            println!("  form data: {}", session.form_data());
            println!("  props:     {}", serde_json::Value::Object(session.form_props().clone()));
        }
        println!();
    }

    let _ = std::fs::remove_dir_all(&dir);
}
