//! ImportSpec: YAML-described imports
//!
//! A spec names the target model, the source format and, for each field,
//! where to read it and which coercion to apply. It produces the same
//! [`ImporterConfig`] a hand-written importer builds.
//!
//! ```yaml
//! model:
//!   name: book
//!   fields:
//!     - { name: title, kind: { type: text, max_length: 80 } }
//!     - { name: pages, kind: { type: int }, nullable: true }
//! source:
//!   format: csv
//!   delimiter: ";"
//! fields:
//!   - { name: title, from: Title }
//!   - { name: pages, from: Pages, parse: int_or_zero }
//! unique_fields: [title]
//! ```

use super::coerce::Coercion;
use super::config::{ConfigError, FieldSource, ImporterConfig};
use crate::adapter::{CsvAdapter, SourceAdapter, XmlAdapter};
use crate::record::ModelSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("cannot read import spec {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid import spec: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("delimiter {0:?} is not a single ASCII character")]
    Delimiter(char),

    #[error("invalid import spec: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Csv,
    Xml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub format: SourceFormat,
    /// XML element that delimits one item
    #[serde(default)]
    pub item_tag: Option<String>,
    /// CSV field delimiter, `,` when absent
    #[serde(default)]
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    /// Column or path to read; the field name when absent
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub parse: Option<Coercion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportSpec {
    pub model: ModelSchema,
    #[serde(default)]
    pub source: SourceSpec,
    pub fields: Vec<FieldEntry>,
    #[serde(default)]
    pub unique_fields: Vec<String>,
}

impl ImportSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn schema(&self) -> Arc<ModelSchema> {
        Arc::new(self.model.clone())
    }

    /// Build the importer configuration this spec describes
    pub fn config<A: SourceAdapter>(&self) -> Result<ImporterConfig<A>, ConfigError> {
        let mut builder = ImporterConfig::builder(self.schema());
        for entry in &self.fields {
            builder = builder.field(entry.name.as_str());
            if let Some(from) = &entry.from {
                builder = builder.map(entry.name.as_str(), from.as_str());
            }
            if let Some(coercion) = entry.parse.clone() {
                builder = builder.extractor(entry.name.as_str(), move |src: &FieldSource<'_, A>| {
                    coercion.apply(src.field, src.raw())
                });
            }
        }
        builder.unique(self.unique_fields.iter().cloned()).build()
    }

    pub fn csv_adapter(&self) -> Result<CsvAdapter, SpecError> {
        let adapter = CsvAdapter::new();
        match self.source.delimiter {
            None => Ok(adapter),
            Some(c) if c.is_ascii() => Ok(adapter.with_delimiter(c as u8)),
            Some(c) => Err(SpecError::Delimiter(c)),
        }
    }

    pub fn xml_adapter(&self) -> XmlAdapter {
        match &self.source.item_tag {
            Some(tag) => XmlAdapter::new().with_item_tag(tag.as_str()),
            None => XmlAdapter::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::Importer;
    use crate::record::FieldValue;
    use crate::storage::{OpenStore, RecordFilter, RecordStore, SqliteStore};
    use std::io::Write;

    const BOOKS: &str = r#"
model:
  name: book
  fields:
    - { name: title, kind: { type: text, max_length: 80 } }
    - { name: pages, kind: { type: int }, nullable: true }
    - { name: isbn, kind: { type: text }, nullable: true }
source:
  format: csv
  delimiter: ";"
fields:
  - { name: title, from: Title }
  - { name: pages, from: Pages, parse: int_or_zero }
  - { name: isbn, parse: null_if_empty }
unique_fields: [title]
"#;

    #[test]
    fn parses_yaml() {
        let spec = ImportSpec::from_yaml(BOOKS).unwrap();
        assert_eq!(spec.model.name, "book");
        assert_eq!(spec.source.format, SourceFormat::Csv);
        assert_eq!(spec.source.delimiter, Some(';'));
        assert_eq!(spec.fields[1].parse, Some(Coercion::IntOrZero));
        assert_eq!(spec.fields[2].from, None);
    }

    #[test]
    fn unknown_coercion_is_rejected() {
        let yaml = BOOKS.replace("int_or_zero", "roman_numeral");
        let err = ImportSpec::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("roman_numeral"));
    }

    #[test]
    fn undeclared_unique_field_fails_config() {
        let yaml = BOOKS.replace("unique_fields: [title]", "unique_fields: [author]");
        let spec = ImportSpec::from_yaml(&yaml).unwrap();
        assert!(spec.config::<CsvAdapter>().is_err());
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let yaml = BOOKS.replace("delimiter: \";\"", "delimiter: \"§\"");
        let spec = ImportSpec::from_yaml(&yaml).unwrap();
        assert!(matches!(spec.csv_adapter(), Err(SpecError::Delimiter('§'))));
    }

    #[test]
    fn drives_a_csv_import() {
        let spec = ImportSpec::from_yaml(BOOKS).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Title;Pages;isbn\nDune;412;\nEmma;unknown;978-0141439587\n")
            .unwrap();
        file.flush().unwrap();

        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut importer = Importer::new(
            spec.config().unwrap(),
            spec.csv_adapter().unwrap(),
            store.clone(),
            file.path(),
        );
        let summary = importer.parse().unwrap();
        assert_eq!(summary.created, 2);

        let books = store.find(&spec.schema(), &RecordFilter::new()).unwrap();
        assert_eq!(books[0].get("pages"), Some(&FieldValue::Int(412)));
        assert_eq!(books[0].get("isbn"), Some(&FieldValue::Null));
        assert_eq!(books[1].get("pages"), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn drives_an_xml_import() {
        let yaml = r#"
model:
  name: entry
  fields:
    - { name: title, kind: { type: text } }
    - { name: published, kind: { type: date } }
    - { name: lang, kind: { type: text }, nullable: true }
source:
  format: xml
  item_tag: entry
fields:
  - { name: title }
  - { name: published, from: meta/published, parse: date }
  - { name: lang, from: "@lang" }
"#;
        let spec = ImportSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.xml_adapter().item_tag(), "entry");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"<feed>
  <entry lang="en"><title> First </title><meta><published>2024-03-01</published></meta></entry>
  <entry><title>Second</title><meta><published>2024-03-02</published></meta></entry>
</feed>"#,
        )
        .unwrap();
        file.flush().unwrap();

        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut importer = Importer::new(
            spec.config().unwrap(),
            spec.xml_adapter(),
            store.clone(),
            file.path(),
        );
        assert_eq!(importer.parse().unwrap().created, 2);

        let entries = store.find(&spec.schema(), &RecordFilter::new()).unwrap();
        assert_eq!(entries[0].get("title"), Some(&FieldValue::from("First")));
        assert_eq!(entries[0].get("lang"), Some(&FieldValue::from("en")));
        assert_eq!(entries[1].get("lang"), Some(&FieldValue::Null));
        assert_eq!(
            entries[1].get("published"),
            Some(&FieldValue::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            ))
        );
    }
}
