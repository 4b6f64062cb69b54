//! Error types for editing sessions and document I/O.
//!
//! Covers every failure mode outside the core operations: file I/O,
//! JSON/YAML (de)serialization, and unsupported file formats. Core
//! [`SchemaError`]s are wrapped as they are.

use form_schema_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while loading, editing or saving schemas.
#[derive(Debug, Error)]
pub enum SessionError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The schema itself was rejected.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// File extension is neither JSON nor YAML.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Convenience alias for results with [`SessionError`].
pub type Result<T> = std::result::Result<T, SessionError>;
