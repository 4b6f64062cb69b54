//! Flattening and rebuilding a schema.
//!
//! Flattens a nested schema into addressable entries, binds form data onto
//! it, and rebuilds both the public schema and the data from the flat map.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p form-schema-demos --example flatten_schema
//! ```

use form_schema_core::{ROOT_ID, extract_data, flatten_value, merge_data_with_report, unflatten_value};
use serde_json::json;

fn main() {
    let schema = json!({
        "type": "object",
        "title": "Order",
        "properties": {
            "customer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "email": { "type": "string", "format": "email" }
                }
            },
            "lines": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sku": { "type": "string" },
                        "quantity": { "type": "integer" }
                    }
                }
            },
            "notes": { "type": "string" }
        }
    });

    let flat = flatten_value(&schema).unwrap();
    println!("{} entries:", flat.len());
    for entry in flat.iter() {
        let indent = entry.id.matches('/').count();
        println!("  {:indent$}{} ({:?})", "", entry.id, entry.kind, indent = indent * 2);
    }
    println!();

    let data = json!({
        "customer": { "name": "Ada", "email": "ada@example.com" },
        "lines": [
            { "sku": "A-1", "quantity": 2 },
            { "sku": "B-7", "quantity": "lots" }
        ],
        "notes": 42
    });
    let (bound, mismatches) = merge_data_with_report(&flat, &data);
    println!("Dropped {} value(s):", mismatches.len());
    for mismatch in &mismatches {
        println!("  {mismatch}");
    }
    println!();

    println!("Extracted data:");
    println!("{}", serde_json::to_string_pretty(&extract_data(&bound)).unwrap());
    println!();

    let rebuilt = unflatten_value(&bound, ROOT_ID, false).unwrap();
    println!("Round trip preserved the schema: {}", rebuilt == schema);

    let customer = unflatten_value(&bound, "#/customer", false).unwrap();
    println!("Subtree #/customer:");
    println!("{}", serde_json::to_string_pretty(&customer).unwrap());
}
