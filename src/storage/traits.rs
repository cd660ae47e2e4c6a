//! Storage trait definitions

use crate::record::{FieldValue, ModelSchema, Record, RecordError, RecordId, ValidationError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed for {model}")]
    Validation {
        model: String,
        #[source]
        source: ValidationError,
    },

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("{count} {model} records match {filter}, expected at most one")]
    MultipleMatches {
        model: String,
        filter: String,
        count: usize,
    },

    #[error("Record not found: {model}#{id}")]
    RecordNotFound { model: String, id: RecordId },

    #[error("Store connection lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Exact-match filter over record fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: Vec<(String, FieldValue)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, FieldValue)] {
        &self.conditions
    }

    /// True if every condition holds for `values`; absent fields count as null
    pub fn matches(&self, values: &BTreeMap<String, FieldValue>) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            values.get(field).unwrap_or(&FieldValue::Null) == expected
        })
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Trait for record storage backends
///
/// Implementations must be thread-safe (Send + Sync) so extractors can
/// share a store with the importer that drives them.
pub trait RecordStore: Send + Sync {
    /// Find all records of `schema`'s model matching the filter, in id order
    fn find(&self, schema: &Arc<ModelSchema>, filter: &RecordFilter) -> StorageResult<Vec<Record>>;

    /// Load a record by id
    fn load(&self, schema: &Arc<ModelSchema>, id: RecordId) -> StorageResult<Option<Record>>;

    /// Validate and save a record (insert when new, update otherwise).
    /// Assigns the id on insert.
    fn save(&self, record: &mut Record) -> StorageResult<RecordId>;

    /// Delete a record by id
    fn delete(&self, model: &str, id: RecordId) -> StorageResult<bool>;

    /// Number of stored records of a model
    fn count(&self, model: &str) -> StorageResult<usize>;

    /// Find the single record matching the filter.
    ///
    /// Zero matches is `Ok(None)`; more than one is
    /// `StorageError::MultipleMatches`.
    fn find_one(&self, schema: &Arc<ModelSchema>, filter: &RecordFilter) -> StorageResult<Option<Record>> {
        let mut matches = self.find(schema, filter)?;
        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            count => Err(StorageError::MultipleMatches {
                model: schema.name.clone(),
                filter: filter.to_string(),
                count,
            }),
        }
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RecordStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
