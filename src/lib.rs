//! importkit: declarative CSV/XML record importer
//!
//! An import maps the fields of a target model onto a source (a CSV column,
//! an XML path), resolves each item to an existing stored record through a
//! set of unique fields or creates a new one, and saves it. Items that fail
//! to save are collected in an error log while the run continues.
//!
//! # Core Concepts
//!
//! - **Sources**: [`SourceAdapter`] implementations read items from CSV and XML files
//! - **Configuration**: [`ImporterConfig`] declares fields, locators, unique keys and extractors
//! - **Storage**: [`RecordStore`] persists schema-validated [`Record`]s
//!
//! # Example
//!
//! ```
//! use importkit::{FieldDef, FieldKind, ImporterConfig, CsvAdapter, ModelSchema};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(
//!     ModelSchema::new("book").with_field(FieldDef::new("title", FieldKind::text())),
//! );
//! let config = ImporterConfig::<CsvAdapter>::builder(schema)
//!     .field("title")
//!     .map("title", "Title")
//!     .unique(["title"])
//!     .build()
//!     .unwrap();
//! assert_eq!(config.resolve("title"), "Title");
//! ```

pub mod adapter;
pub mod fetch;
pub mod importer;
pub mod record;
pub mod storage;
pub mod tasks;

pub use adapter::{CsvAdapter, CsvRow, SourceAdapter, SourceError, XmlAdapter, XmlItem};
pub use importer::{
    ConfigError, ErrorEntry, ExtractError, ImportError, ImportSpec, ImportSummary, Importer,
    ImporterConfig, ParsedRecord,
};
pub use record::{FieldDef, FieldKind, FieldValue, ModelSchema, Record, RecordId, RecordRef};
pub use storage::{OpenStore, RecordFilter, RecordStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
