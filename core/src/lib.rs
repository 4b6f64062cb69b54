//! Flat, addressable representation of form schema trees.
//!
//! A form editor works on individual fields of a nested JSON-Schema-like
//! document. This crate turns such a document into a flat map where every
//! node is an entry with a stable id, and back again without loss:
//!
//! - [`flatten`] / [`flatten_with`]: schema tree to [`FlatMap`], with
//!   pluggable [`IdAllocator`]s.
//! - [`unflatten`]: [`FlatMap`] (or any subtree of it) back to a
//!   [`SchemaNode`], in the public or internal form.
//! - [`merge_data`] / [`extract_data`]: bind nested form data onto entries
//!   and read it back, pruning values the schema cannot hold.
//! - [`mutate_entry`] and the structural edits ([`insert_property`],
//!   [`remove_entry`], [`move_entry`], [`duplicate_entry`]): copy-on-write
//!   edits that keep ids stable.
//! - [`normalize_document`]: accepts the legacy `propsSchema` convention
//!   and the wrapped `{ "schema": ... }` convention.
//! - [`validate_flat_map`]: structural checks for maps built elsewhere.
//!
//! # Example
//!
//! ```
//! use form_schema_core::*;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "name": { "type": "string" },
//!         "address": {
//!             "type": "object",
//!             "properties": { "city": { "type": "string" } }
//!         }
//!     }
//! });
//!
//! let flat = flatten_value(&schema).unwrap();
//! assert!(flat.contains("#/address/city"));
//!
//! let flat = merge_data(&flat, &json!({ "name": "Ada", "address": { "city": "London" } }));
//! assert_eq!(flat.get("#/address/city").unwrap().value, Some(json!("London")));
//!
//! let (flat, _) = insert_property(&flat, ROOT_ID, "email", &SchemaNode::leaf("string"), None).unwrap();
//! let rebuilt = unflatten_value(&flat, ROOT_ID, false).unwrap();
//! assert_eq!(rebuilt["properties"]["email"], json!({ "type": "string" }));
//! assert_eq!(
//!     extract_data(&flat),
//!     json!({ "name": "Ada", "address": { "city": "London" } })
//! );
//! ```

mod bind;
mod error;
mod flatten;
mod id;
mod mutate;
mod schedule;
mod transform;
mod types;
mod unflatten;
mod validate;
mod version;

pub use bind::{extract_data, merge_data, merge_data_with_report};
pub use error::{Result, SchemaError, ValueMismatch};
pub use flatten::{FlattenOptions, flatten, flatten_value, flatten_with};
pub use id::{FnAllocator, IdAllocator, IdRequest, PathAllocator, allocate_id, fn_allocator};
pub use mutate::{
    EntryPatch, duplicate_entry, duplicate_entry_with, insert_property, insert_property_with, move_entry,
    mutate_entry, remove_entry,
};
pub use schedule::DeferredQueue;
pub use transform::{IdentityTransformer, LegacyTransformer, SchemaTransformer};
pub use types::*;
pub use unflatten::{unflatten, unflatten_value};
pub use validate::validate_flat_map;
pub use version::{
    NormalizedDocument, SchemaVersion, UI_KEYWORDS, combine_form_props, detect_version,
    normalize_document, normalize_version, to_legacy,
};
