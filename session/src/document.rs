//! Reading and writing schema documents.
//!
//! Documents are plain JSON or YAML files. [`load_document`] picks the
//! format from the file extension and falls back to JSON, so extension-less
//! exports keep working. [`SchemaLibrary`] loads a whole directory of named
//! documents, the editor's "load example" catalogue.
//!
//! # Loading patterns
//!
//! ```no_run
//! use form_schema_session::{SchemaLibrary, load_document};
//!
//! let doc = load_document("schemas/profile.json").unwrap();
//! println!("{}", doc["title"]);
//!
//! let library = SchemaLibrary::from_dir("schemas/").unwrap();
//! for name in library.names() {
//!     println!("  {name}");
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;

/// On-disk serialization of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yml` / `.yaml`
    Yaml,
}

impl DocumentFormat {
    /// Format implied by the extension of `path`, if recognized.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_schema_session::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_path("a/b.yaml"), Some(DocumentFormat::Yaml));
    /// assert_eq!(DocumentFormat::from_path("a/b.JSON"), Some(DocumentFormat::Json));
    /// assert_eq!(DocumentFormat::from_path("a/b.txt"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Reads a schema document (JSON unless the extension says YAML).
///
/// # Errors
///
/// Returns [`Io`](crate::SessionError::Io) if the file cannot be read, or
/// [`Json`](crate::SessionError::Json)/[`Yaml`](crate::SessionError::Yaml)
/// if it does not parse.
pub fn load_document(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let reader = BufReader::new(std::fs::File::open(path)?);
    let document = match DocumentFormat::from_path(path).unwrap_or(DocumentFormat::Json) {
        DocumentFormat::Json => serde_json::from_reader(reader)?,
        DocumentFormat::Yaml => serde_yaml::from_reader(reader)?,
    };
    debug!(path = %path.display(), "loaded schema document");
    Ok(document)
}

/// Writes a schema document (pretty JSON unless the extension says YAML).
///
/// # Errors
///
/// Returns [`Io`](crate::SessionError::Io) if the file cannot be written, or
/// a serialization error.
pub fn save_document(path: impl AsRef<Path>, document: &Value) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(std::fs::File::create(path)?);
    match DocumentFormat::from_path(path).unwrap_or(DocumentFormat::Json) {
        DocumentFormat::Json => serde_json::to_writer_pretty(writer, document)?,
        DocumentFormat::Yaml => serde_yaml::to_writer(writer, document)?,
    }
    Ok(())
}

/// SHA-256 hex digest of a document's JSON text.
///
/// Key order is significant (property order is part of a schema), so two
/// documents differing only in property order have different fingerprints.
///
/// # Examples
///
/// ```
/// use form_schema_session::fingerprint;
/// use serde_json::json;
///
/// let a = fingerprint(&json!({ "type": "object" }));
/// assert_eq!(a.len(), 64);
/// assert_eq!(a, fingerprint(&json!({ "type": "object" })));
/// assert_ne!(a, fingerprint(&json!({ "type": "string" })));
/// ```
pub fn fingerprint(document: &Value) -> String {
    let hash = Sha256::digest(document.to_string().as_bytes());
    format!("{:x}", hash)
}

/// Named schema documents loaded from a directory.
///
/// # Examples
///
/// ```no_run
/// use form_schema_session::SchemaLibrary;
///
/// let library = SchemaLibrary::from_dir("schemas/").unwrap();
/// if let Some(profile) = library.get("profile") {
///     println!("profile has {} top-level keys", profile.as_object().map_or(0, |o| o.len()));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaLibrary {
    documents: BTreeMap<String, Value>,
    source: Option<PathBuf>,
}

impl SchemaLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json`, `*.yml` and `*.yaml` file in `path`, keyed by
    /// file stem. Other files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::SessionError::Io) if the directory or a file
    /// cannot be read, or a parse error for the first invalid document.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut documents = BTreeMap::new();

        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if DocumentFormat::from_path(&file_path).is_none() {
                continue;
            }
            let Some(name) = file_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            documents.insert(name.to_string(), load_document(&file_path)?);
        }

        debug!(path = %path.display(), count = documents.len(), "loaded schema library");
        Ok(Self {
            documents,
            source: Some(path.to_path_buf()),
        })
    }

    /// Looks up a document by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.documents.get(name)
    }

    /// Adds or replaces a document.
    pub fn insert(&mut self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), document);
    }

    /// Returns `true` if the library holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the library holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Directory the library was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
