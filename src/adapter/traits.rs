//! SourceAdapter trait: the contract source formats implement
//!
//! An adapter owns the open source handle, hands out items one at a time,
//! and extracts a named field's text from an item.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while opening or reading a source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// `items()` was called without a loaded source, or a second time on the
    /// same load
    #[error("{format} source is not loaded")]
    NotLoaded { format: &'static str },
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Lazy, single-pass item sequence returned by [`SourceAdapter::items`]
pub type SourceItems<T> = Box<dyn Iterator<Item = SourceResult<T>>>;

/// The contract source adapters implement.
///
/// The importer drives the lifecycle: `load` once, `items` once, then
/// `unload`. The sequence returned by `items` owns what it reads, so
/// `value` can be called while it is being consumed.
pub trait SourceAdapter: 'static {
    /// One unit of input (a CSV row, an XML element)
    type Item: 'static;

    /// Short format name used in logs and errors
    fn format(&self) -> &'static str;

    /// Acquire the source handle
    fn load(&mut self, source: &Path) -> SourceResult<()>;

    /// Hand out the items of the loaded source.
    ///
    /// Returns `SourceError::NotLoaded` if nothing is loaded or the items
    /// were already taken.
    fn items(&mut self) -> SourceResult<SourceItems<Self::Item>>;

    /// Extract the text at `locator`, whitespace-trimmed.
    ///
    /// A structurally valid item that lacks the field yields `None`.
    fn value(&self, item: &Self::Item, locator: &str) -> Option<String>;

    /// Release the source handle
    fn unload(&mut self);
}
