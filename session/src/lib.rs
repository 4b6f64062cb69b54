//! Editing sessions, configuration and document I/O for form schemas.
//!
//! Builds on `form-schema-core` with the pieces an editor needs around the
//! flat map operations:
//!
//! - [`EditorSession`]: owns the current schema and data, rejects failed
//!   edits, and batches change [`Notification`]s until
//!   [`flush`](EditorSession::flush).
//! - [`EditorConfig`]: YAML/JSON configuration.
//! - [`load_document`], [`save_document`] and [`SchemaLibrary`]: schema
//!   files on disk.
//!
//! # Quick start
//!
//! ```no_run
//! use form_schema_session::{EditorConfig, EditorSession, load_document};
//!
//! let config = EditorConfig::load(".form-schema.yml").unwrap_or_default();
//! let mut session = EditorSession::new(config);
//! session.load(&load_document("schemas/profile.json").unwrap()).unwrap();
//!
//! for notification in session.flush() {
//!     println!("{notification:?}");
//! }
//! ```

mod config;
mod document;
mod error;
mod session;

pub use config::EditorConfig;
pub use document::{DocumentFormat, SchemaLibrary, fingerprint, load_document, save_document};
pub use error::{Result, SessionError};
pub use session::{EditorSession, Notification};
