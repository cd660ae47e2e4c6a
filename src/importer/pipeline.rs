//! Importer: drives one source through parse → resolve → feed → save
//!
//! Only the save step is a fault boundary. A save failure is recorded as an
//! [`ErrorEntry`] and the run moves on to the next item; any failure before
//! the save (reading the source, a custom extractor, an ambiguous unique-key
//! lookup, assigning values) aborts the whole run. The source is unloaded on
//! every exit path.

use super::config::{ExtractError, FieldSource, ImporterConfig};
use super::error_log::{format_trace, ErrorEntry};
use super::parsed::ParsedRecord;
use crate::adapter::{SourceAdapter, SourceError};
use crate::record::{FieldValue, Record, RecordError};
use crate::storage::{RecordFilter, RecordStore, StorageError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("item {index}: extraction failed")]
    Extract {
        index: usize,
        #[source]
        source: ExtractError,
    },

    #[error("item {index}: cannot resolve target record")]
    Resolve {
        index: usize,
        #[source]
        source: StorageError,
    },

    #[error("item {index}: cannot assign parsed values")]
    Feed {
        index: usize,
        #[source]
        source: RecordError,
    },
}

/// Counts for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn saved(&self) -> usize {
        self.created + self.updated
    }
}

/// Imports one source into a record store
pub struct Importer<A: SourceAdapter> {
    config: ImporterConfig<A>,
    adapter: A,
    store: Arc<dyn RecordStore>,
    source: PathBuf,
    loaded: bool,
    commit: bool,
    errors: Vec<ErrorEntry>,
}

impl<A: SourceAdapter> Importer<A> {
    pub fn new(
        config: ImporterConfig<A>,
        adapter: A,
        store: Arc<dyn RecordStore>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            adapter,
            store,
            source: source.into(),
            loaded: false,
            commit: true,
            errors: Vec::new(),
        }
    }

    /// With `commit == false` the run parses and resolves every item but
    /// writes nothing.
    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn config(&self) -> &ImporterConfig<A> {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Failures captured by the last run, in source order
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ErrorEntry> {
        std::mem::take(&mut self.errors)
    }

    /// Open the source unless it is already open
    pub fn load(&mut self) -> Result<(), SourceError> {
        if !self.loaded {
            self.adapter.load(&self.source)?;
            self.loaded = true;
            debug!(source = %self.source.display(), format = self.adapter.format(), "source loaded");
        }
        Ok(())
    }

    pub fn unload(&mut self) {
        self.adapter.unload();
        self.loaded = false;
    }

    /// Import every item of the source.
    ///
    /// Save failures do not stop the run; read them from
    /// [`Importer::errors`] afterwards. Each call starts a fresh error log.
    pub fn parse(&mut self) -> Result<ImportSummary, ImportError> {
        self.errors.clear();
        info!(
            model = %self.config.schema().name,
            format = self.adapter.format(),
            source = %self.source.display(),
            commit = self.commit,
            "import started"
        );

        let outcome = match self.load() {
            Ok(()) => self.run_items(),
            Err(e) => Err(e.into()),
        };
        self.unload();

        match &outcome {
            Ok(summary) => info!(
                processed = summary.processed,
                created = summary.created,
                updated = summary.updated,
                failed = summary.failed,
                "import finished"
            ),
            Err(e) => error!(error = %e, "import aborted"),
        }
        outcome
    }

    fn run_items(&mut self) -> Result<ImportSummary, ImportError> {
        let items = self.adapter.items()?;
        let mut summary = ImportSummary::default();

        for (offset, item) in items.enumerate() {
            let index = offset + 1;
            let item = item?;
            summary.processed += 1;

            let data = self
                .parse_item(&item)
                .map_err(|source| ImportError::Extract { index, source })?;
            let record = self
                .get_instance(&data)
                .map_err(|source| ImportError::Resolve { index, source })?;
            let is_new = record.is_new();
            let record = self
                .feed_instance(&data, record)
                .map_err(|source| ImportError::Feed { index, source })?;

            match self.save_item(&item, &data, record, self.commit) {
                Ok(saved) => {
                    if is_new {
                        summary.created += 1;
                    } else {
                        summary.updated += 1;
                    }
                    debug!(index, id = ?saved.id(), created = is_new, "item saved");
                }
                Err(err) => {
                    warn!(index, error = %err, "item failed to save");
                    summary.failed += 1;
                    self.errors.push(ErrorEntry {
                        index,
                        data,
                        trace: format_trace(&err),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Extract every declared field from one item, in declaration order.
    ///
    /// Fields with a registered extractor go through it; the rest take the
    /// adapter's text as-is, or `Null` when absent.
    pub fn parse_item(&self, item: &A::Item) -> Result<ParsedRecord, ExtractError> {
        let mut data = ParsedRecord::with_capacity(self.config.fields().len());

        for spec in self.config.fields() {
            let locator = self.config.resolve(&spec.name);
            let value = match self.config.extractor(&spec.name) {
                Some(extract) => extract(&FieldSource {
                    adapter: &self.adapter,
                    item,
                    field: &spec.name,
                    locator,
                })?,
                None => FieldValue::from(self.adapter.value(item, locator)),
            };
            data.insert(spec.name.clone(), value);
        }

        Ok(data)
    }

    /// The stored record matching the unique fields, or a new record.
    ///
    /// With no unique fields every item is a new record and the store is
    /// not consulted.
    pub fn get_instance(&self, data: &ParsedRecord) -> Result<Record, StorageError> {
        let schema = self.config.schema();
        let unique = self.config.unique_fields();
        if unique.is_empty() {
            return Ok(Record::new(Arc::clone(schema)));
        }

        let filter = unique.iter().fold(RecordFilter::new(), |filter, field| {
            filter.eq(field.as_str(), data.get(field).cloned().unwrap_or_default())
        });

        let existing = self.store.find_one(schema, &filter)?;
        Ok(existing.unwrap_or_else(|| Record::new(Arc::clone(schema))))
    }

    /// Copy every parsed value onto the record, overwriting
    pub fn feed_instance(&self, data: &ParsedRecord, mut record: Record) -> Result<Record, RecordError> {
        for (field, value) in data.iter() {
            record.set(field, value.clone())?;
        }
        Ok(record)
    }

    /// Persist the record when `commit` is set; otherwise return it untouched.
    ///
    /// Receives the source item and its parsed values alongside the record;
    /// storage errors are returned unchanged.
    pub fn save_item(
        &self,
        _item: &A::Item,
        data: &ParsedRecord,
        mut record: Record,
        commit: bool,
    ) -> Result<Record, StorageError> {
        if commit {
            let id = self.store.save(&mut record)?;
            debug!(model = record.model(), %id, fields = data.len(), "record stored");
        }
        Ok(record)
    }
}
