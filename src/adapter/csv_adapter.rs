//! CSV source adapter
//!
//! The first row is the header. Each following row becomes a [`CsvRow`]
//! keyed by header name. Rows may be shorter than the header; the missing
//! trailing columns read as absent.

use super::traits::{SourceAdapter, SourceError, SourceItems, SourceResult};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// One data row of a CSV source
#[derive(Debug, Clone)]
pub struct CsvRow {
    headers: Arc<StringRecord>,
    values: StringRecord,
}

impl CsvRow {
    /// Raw value of the column named `column`.
    ///
    /// When the header repeats a name, the last such column wins. Falls
    /// back to a zero-based column position when `column` is not a header
    /// name but parses as a number.
    pub fn get(&self, column: &str) -> Option<&str> {
        let last = self
            .headers
            .as_byte_record()
            .iter()
            .rposition(|h| h == column.as_bytes());
        match last {
            Some(pos) => self.values.get(pos),
            None => column
                .parse::<usize>()
                .ok()
                .and_then(|pos| self.values.get(pos)),
        }
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads rows from a local CSV file
pub struct CsvAdapter {
    delimiter: u8,
    reader: Option<csv::Reader<File>>,
}

impl CsvAdapter {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            reader: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for CsvAdapter {
    type Item = CsvRow;

    fn format(&self) -> &'static str {
        "csv"
    }

    fn load(&mut self, source: &Path) -> SourceResult<()> {
        let file = File::open(source).map_err(|e| SourceError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(file);
        self.reader = Some(reader);
        Ok(())
    }

    fn items(&mut self) -> SourceResult<SourceItems<CsvRow>> {
        let mut reader = self
            .reader
            .take()
            .ok_or(SourceError::NotLoaded { format: "csv" })?;
        let headers = Arc::new(reader.headers()?.clone());

        let rows = reader.into_records().filter_map(move |result| match result {
            // Skip empty rows
            Ok(values) if values.is_empty() => None,
            Ok(values) => Some(Ok(CsvRow {
                headers: Arc::clone(&headers),
                values,
            })),
            Err(e) => Some(Err(SourceError::from(e))),
        });
        Ok(Box::new(rows))
    }

    fn value(&self, item: &CsvRow, locator: &str) -> Option<String> {
        item.get(locator).map(|v| v.trim().to_string())
    }

    fn unload(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn read_all(adapter: &mut CsvAdapter, path: &Path) -> Vec<CsvRow> {
        adapter.load(path).unwrap();
        adapter
            .items()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn rows_are_keyed_by_header() {
        let file = write_source("Name,Date\nAlice,Mon 05\n  Bob  ,Tue 06\n");
        let mut adapter = CsvAdapter::new();
        let rows = read_all(&mut adapter, file.path());

        assert_eq!(rows.len(), 2);
        assert_eq!(adapter.value(&rows[0], "Name").as_deref(), Some("Alice"));
        assert_eq!(adapter.value(&rows[1], "Name").as_deref(), Some("Bob"));
        assert_eq!(adapter.value(&rows[1], "Date").as_deref(), Some("Tue 06"));
    }

    #[test]
    fn missing_column_is_none() {
        let file = write_source("Name,Date\nAlice\n");
        let mut adapter = CsvAdapter::new();
        let rows = read_all(&mut adapter, file.path());

        assert_eq!(adapter.value(&rows[0], "Date"), None);
        assert_eq!(adapter.value(&rows[0], "Nope"), None);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let file = write_source("Name\nAlice\n\n\nBob\n");
        let mut adapter = CsvAdapter::new();
        assert_eq!(read_all(&mut adapter, file.path()).len(), 2);
    }

    #[test]
    fn positional_locator_selects_column() {
        let file = write_source("Name,Date\nAlice,Mon 05\n");
        let mut adapter = CsvAdapter::new();
        let rows = read_all(&mut adapter, file.path());
        assert_eq!(adapter.value(&rows[0], "1").as_deref(), Some("Mon 05"));
    }

    #[test]
    fn repeated_header_reads_last_column() {
        let file = write_source("Name,Date,Name\nAlice,Mon 05,Alicia\n");
        let mut adapter = CsvAdapter::new();
        let rows = read_all(&mut adapter, file.path());
        assert_eq!(adapter.value(&rows[0], "Name").as_deref(), Some("Alicia"));
        assert_eq!(adapter.value(&rows[0], "0").as_deref(), Some("Alice"));
    }

    #[test]
    fn custom_delimiter() {
        let file = write_source("Name;Date\nAlice;Mon 05\n");
        let mut adapter = CsvAdapter::new().with_delimiter(b';');
        let rows = read_all(&mut adapter, file.path());
        assert_eq!(adapter.value(&rows[0], "Date").as_deref(), Some("Mon 05"));
    }

    #[test]
    fn items_are_single_pass() {
        let file = write_source("Name\nAlice\n");
        let mut adapter = CsvAdapter::new();
        read_all(&mut adapter, file.path());
        assert!(matches!(
            adapter.items(),
            Err(SourceError::NotLoaded { format: "csv" })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let mut adapter = CsvAdapter::new();
        let err = adapter.load(Path::new("/nonexistent/tasks.csv")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
