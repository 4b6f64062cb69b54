//! Driving an editing session.
//!
//! Loads a schema into an [`EditorSession`], edits it the way a form editor
//! would (retype a field, add and move properties, duplicate one), and
//! prints the notifications a host would receive after each update cycle.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p form-schema-demos --example editor_session
//! ```

use form_schema_core::{EntryPatch, ROOT_ID, SchemaNode};
use form_schema_session::{EditorConfig, EditorSession, Notification};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut session = EditorSession::new(EditorConfig {
        hide_id: true,
        ..EditorConfig::default()
    });
    session
        .load(&json!({
            "schema": {
                "type": "object",
                "title": "Contact",
                "properties": {
                    "name": { "type": "string", "title": "Name" },
                    "phone": { "type": "string", "title": "Phone" }
                }
            },
            "formData": { "name": "Ada", "phone": "555-0100" }
        }))
        .unwrap();
    report("load", &mut session);

    // Typing into a field only touches the data.
    session.update_entry("#/name", EntryPatch::value(json!("Ada L"))).unwrap();
    session.update_entry("#/name", EntryPatch::value(json!("Ada Lovelace"))).unwrap();
    report("typing", &mut session);

    // Turn `phone` into a group and give it fields.
    let mut keywords = serde_json::Map::new();
    keywords.insert("type".into(), json!("object"));
    keywords.insert("title".into(), json!("Phone"));
    session.update_entry("#/phone", EntryPatch::schema(keywords)).unwrap();
    session
        .insert_property("#/phone", "home", &SchemaNode::leaf("string"), None)
        .unwrap();
    let mobile = session
        .insert_property("#/phone", "mobile", &SchemaNode::leaf("string"), Some(0))
        .unwrap();
    report("retype phone", &mut session);

    // Pull `mobile` up to the top level and copy it.
    session.move_entry(&mobile, ROOT_ID, None).unwrap();
    let copy = session.duplicate_entry(&mobile).unwrap();
    session.select(&copy);
    report("move and duplicate", &mut session);

    // Rejected edits leave the session alone and notify nobody.
    if let Err(e) = session.remove_entry(ROOT_ID) {
        println!("rejected: {e}");
    }
    report("rejected edit", &mut session);

    println!("selected: {:?}", session.selected());
    println!("display schema:");
    println!("{}", serde_json::to_string_pretty(&session.display_schema().unwrap()).unwrap());
}

fn report(step: &str, session: &mut EditorSession) {
    let notifications = session.flush();
    println!("== {step}: {} notification(s)", notifications.len());
    for notification in notifications {
        match notification {
            Notification::SchemaChanged(schema) => {
                println!("schema: {schema}");
            }
            Notification::DataChanged(data) => {
                println!("data:   {data}");
            }
        }
    }
    println!();
}
