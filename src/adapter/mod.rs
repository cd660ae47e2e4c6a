//! Source adapters
//!
//! Adapters own the raw source (a CSV file, an XML document), hand out
//! items one at a time and extract field text from them. The importer
//! never looks inside an item except through [`SourceAdapter::value`].

mod csv_adapter;
mod traits;
mod xml_adapter;

pub use csv_adapter::{CsvAdapter, CsvRow};
pub use traits::{SourceAdapter, SourceError, SourceItems, SourceResult};
pub use xml_adapter::{XmlAdapter, XmlItem};
