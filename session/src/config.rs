//! Editor configuration.
//!
//! Controls how an [`EditorSession`](crate::EditorSession) imports and
//! exports schemas. Stored as YAML (typically `.form-schema.yml` next to the
//! schemas) or JSON; every field is optional.
//!
//! # Example YAML
//!
//! ```yaml
//! hide_id: true
//! preserve_version: true
//! resolve_refs: false
//! default_schema:
//!   type: object
//!   properties: {}
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::DocumentFormat;
use crate::error::{Result, SessionError};

/// Session behavior.
///
/// # Examples
///
/// ```
/// use form_schema_session::EditorConfig;
///
/// let config: EditorConfig = serde_yaml::from_str("hide_id: true").unwrap();
/// assert!(config.hide_id);
/// assert!(config.preserve_version);
/// assert_eq!(config.default_schema["type"], "object");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Leave `$id`s out of the display schema.
    pub hide_id: bool,
    /// Export in the convention the document was loaded in.
    pub preserve_version: bool,
    /// Inline local `$ref`s when loading.
    pub resolve_refs: bool,
    /// Schema used when nothing (or something broken) is loaded.
    pub default_schema: Value,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hide_id: false,
            preserve_version: true,
            resolve_refs: false,
            default_schema: json!({ "type": "object", "properties": {} }),
        }
    }
}

impl EditorConfig {
    /// Loads configuration from a YAML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`](SessionError::UnsupportedFormat) for
    /// other extensions, [`Io`](SessionError::Io) if the file cannot be
    /// read, or a parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let reader = BufReader::new(std::fs::File::open(path)?);
        let config = match format {
            DocumentFormat::Json => serde_json::from_reader(reader)?,
            DocumentFormat::Yaml => serde_yaml::from_reader(reader)?,
        };
        Ok(config)
    }

    /// Saves the configuration as YAML or JSON, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`](SessionError::UnsupportedFormat) for
    /// other extensions, [`Io`](SessionError::Io) if the file cannot be
    /// written, or a serialization error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let writer = BufWriter::new(std::fs::File::create(path)?);
        match format {
            DocumentFormat::Json => serde_json::to_writer_pretty(writer, self)?,
            DocumentFormat::Yaml => serde_yaml::to_writer(writer, self)?,
        }
        Ok(())
    }
}

fn format_of(path: &Path) -> Result<DocumentFormat> {
    DocumentFormat::from_path(path)
        .ok_or_else(|| SessionError::UnsupportedFormat(path.display().to_string()))
}
