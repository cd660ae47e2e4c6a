//! Storage backends for imported records
//!
//! Stores implement the `RecordStore` trait. The primary implementation is
//! `SqliteStore` for persistent storage.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, RecordFilter, RecordStore, StorageError, StorageResult};
