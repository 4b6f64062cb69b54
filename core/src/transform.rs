//! Host hooks applied at the edges of an editing session.
//!
//! A transformer sees every schema document on its way in (before version
//! normalization) and on its way out (after reconstruction). Hosts use it to
//! translate between their storage format and the current convention.

use serde_json::{Map, Value};

use crate::version::to_legacy;

/// Rewrites schema documents crossing the session boundary.
///
/// Both methods default to the identity.
pub trait SchemaTransformer: Send + Sync {
    /// Applied to documents loaded into a session.
    fn import_schema(&self, document: Value) -> Value {
        document
    }

    /// Applied to documents exported from a session.
    fn export_schema(&self, document: Value) -> Value {
        document
    }
}

/// Leaves documents untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl SchemaTransformer for IdentityTransformer {}

/// Exports in the legacy `propsSchema` convention.
///
/// Imports need no work: legacy documents are recognized by the version
/// normalizer.
///
/// # Examples
///
/// ```
/// use form_schema_core::{LegacyTransformer, SchemaTransformer};
/// use serde_json::json;
///
/// let exported = LegacyTransformer.export_schema(json!({ "type": "object" }));
/// assert_eq!(exported, json!({ "propsSchema": { "type": "object" } }));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyTransformer;

impl SchemaTransformer for LegacyTransformer {
    fn export_schema(&self, document: Value) -> Value {
        to_legacy(&document, &Map::new())
    }
}
