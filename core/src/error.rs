//! Error types for schema flattening and reconstruction.
//!
//! Structural failures ([`SchemaError`]) abort the operation that raised them
//! and leave any input flat map untouched. Data mismatches
//! ([`ValueMismatch`]) are recovered locally by the data binder and only
//! reported.

use serde_json::Value;
use thiserror::Error;

/// Structural errors raised by the flattener, unflattener and mutator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The input is not a well-formed schema tree (wrong JSON shape, a
    /// cyclic `$ref` chain, a rename onto a sibling name, ...).
    #[error("malformed schema at {path}: {reason}")]
    MalformedSchema {
        /// Location of the offending node (id or id-like path).
        path: String,
        /// What is wrong with it.
        reason: String,
    },
    /// An entry references an id that is not in the flat map.
    ///
    /// This is an internal consistency failure: some earlier mutation left
    /// the map inconsistent.
    #[error("broken reference: entry `{id}` (referenced by {referenced_by}) is missing")]
    BrokenReference {
        /// The missing id.
        id: String,
        /// The entry or operation that referenced it.
        referenced_by: String,
    },
    /// An identifier was assigned to more than one node.
    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(String),
}

impl SchemaError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn broken(id: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::BrokenReference {
            id: id.into(),
            referenced_by: referenced_by.into(),
        }
    }
}

/// A data value whose shape disagrees with the schema at `id`.
///
/// Non-fatal: the binder drops the value and continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value mismatch at `{id}`: expected {expected}, found {found}")]
pub struct ValueMismatch {
    /// Entry whose schema rejected the value.
    pub id: String,
    /// Expected JSON kind (e.g. `"object"`, `"string"`).
    pub expected: String,
    /// JSON kind actually found.
    pub found: &'static str,
}

/// Convenience alias for results with [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Name of the JSON kind of `value`, as used in JSON Schema `type`.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
