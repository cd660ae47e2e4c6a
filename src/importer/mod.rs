//! Import pipeline: configuration, per-item parsing, record resolution,
//! persistence and the per-item error log

mod coerce;
mod config;
mod declarative;
mod error_log;
mod parsed;
mod pipeline;

pub use coerce::{parse_time, Coercion, UnknownCoercion};
pub use config::{
    ConfigError, ExtractError, Extractor, FieldSource, FieldSpec, ImporterConfig,
    ImporterConfigBuilder,
};
pub use declarative::{FieldEntry, ImportSpec, SourceFormat, SourceSpec, SpecError};
pub use error_log::{format_trace, ErrorEntry};
pub use parsed::ParsedRecord;
pub use pipeline::{ImportError, ImportSummary, Importer};
