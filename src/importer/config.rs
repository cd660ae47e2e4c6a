//! Importer configuration: declared fields, source locators, unique keys
//! and per-field extractors
//!
//! A config is built once through [`ImporterConfigBuilder`] and never
//! changes afterwards. `build()` checks every name against the model
//! schema and the declared field list, so a config that builds is
//! internally consistent.

use crate::adapter::SourceAdapter;
use crate::record::{FieldValue, ModelSchema};
use crate::storage::StorageError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors detected while building a configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{role} lists '{field}' more than once")]
    Duplicate { role: &'static str, field: String },

    #[error("model '{model}' has no field '{field}'")]
    UnknownModelField { model: String, field: String },

    #[error("{role} names '{field}', which is not a declared import field")]
    UndeclaredField { role: &'static str, field: String },
}

/// Errors raised by a custom field extractor
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("field '{field}' is missing from the source item")]
    Missing { field: String },

    #[error("field '{field}': cannot parse {value:?}: {reason}")]
    Invalid {
        field: String,
        value: String,
        reason: String,
    },

    #[error("field '{field}': lookup failed")]
    Lookup {
        field: String,
        #[source]
        source: StorageError,
    },
}

/// What an extractor sees: the item, the field being parsed and the
/// resolved source locator
pub struct FieldSource<'a, A: SourceAdapter> {
    pub adapter: &'a A,
    pub item: &'a A::Item,
    pub field: &'a str,
    pub locator: &'a str,
}

impl<'a, A: SourceAdapter> FieldSource<'a, A> {
    /// The adapter's trimmed text at the locator
    pub fn raw(&self) -> Option<String> {
        self.adapter.value(self.item, self.locator)
    }

    /// Like [`FieldSource::raw`] but a missing value is an error
    pub fn require(&self) -> Result<String, ExtractError> {
        self.raw().ok_or_else(|| ExtractError::Missing {
            field: self.field.to_string(),
        })
    }

    pub fn invalid(&self, value: impl Into<String>, reason: impl fmt::Display) -> ExtractError {
        ExtractError::Invalid {
            field: self.field.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Custom extraction/transform for one field
pub type Extractor<A> =
    Arc<dyn Fn(&FieldSource<'_, A>) -> Result<FieldValue, ExtractError> + Send + Sync>;

/// One declared import field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Source locator (CSV column, XML path); `None` means the field name
    pub locator: Option<String>,
}

impl FieldSpec {
    pub fn locator(&self) -> &str {
        self.locator.as_deref().unwrap_or(&self.name)
    }
}

/// Immutable importer configuration
pub struct ImporterConfig<A: SourceAdapter> {
    schema: Arc<ModelSchema>,
    fields: Vec<FieldSpec>,
    unique_fields: Vec<String>,
    extractors: HashMap<String, Extractor<A>>,
}

impl<A: SourceAdapter> ImporterConfig<A> {
    pub fn builder(schema: Arc<ModelSchema>) -> ImporterConfigBuilder<A> {
        ImporterConfigBuilder::new(schema)
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn unique_fields(&self) -> &[String] {
        &self.unique_fields
    }

    /// Source locator for a field, defaulting to the field name itself
    pub fn resolve<'s>(&'s self, field: &'s str) -> &'s str {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(FieldSpec::locator)
            .unwrap_or(field)
    }

    pub fn extractor(&self, field: &str) -> Option<&Extractor<A>> {
        self.extractors.get(field)
    }
}

impl<A: SourceAdapter> Clone for ImporterConfig<A> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            fields: self.fields.clone(),
            unique_fields: self.unique_fields.clone(),
            extractors: self.extractors.clone(),
        }
    }
}

impl<A: SourceAdapter> fmt::Debug for ImporterConfig<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extractors: Vec<&String> = self.extractors.keys().collect();
        extractors.sort();
        f.debug_struct("ImporterConfig")
            .field("model", &self.schema.name)
            .field("fields", &self.fields)
            .field("unique_fields", &self.unique_fields)
            .field("extractors", &extractors)
            .finish()
    }
}

/// Builder for [`ImporterConfig`]
pub struct ImporterConfigBuilder<A: SourceAdapter> {
    schema: Arc<ModelSchema>,
    fields: Vec<String>,
    field_map: Vec<(String, String)>,
    unique_fields: Vec<String>,
    extractors: Vec<(String, Extractor<A>)>,
}

impl<A: SourceAdapter> ImporterConfigBuilder<A> {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            fields: Vec::new(),
            field_map: Vec::new(),
            unique_fields: Vec::new(),
            extractors: Vec::new(),
        }
    }

    /// Declare a field to import
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Read `field` from `locator` instead of from a column/path named
    /// after the field
    pub fn map(mut self, field: impl Into<String>, locator: impl Into<String>) -> Self {
        self.field_map.push((field.into(), locator.into()));
        self
    }

    /// Fields whose values identify an existing record
    pub fn unique<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Register a custom extractor for `field`
    pub fn extractor<F>(self, field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&FieldSource<'_, A>) -> Result<FieldValue, ExtractError> + Send + Sync + 'static,
    {
        self.shared_extractor(field, Arc::new(extract))
    }

    /// Register an extractor that may also be used for other fields
    pub fn shared_extractor(mut self, field: impl Into<String>, extract: Extractor<A>) -> Self {
        self.extractors.push((field.into(), extract));
        self
    }

    pub fn build(self) -> Result<ImporterConfig<A>, ConfigError> {
        let mut fields: Vec<FieldSpec> = Vec::with_capacity(self.fields.len());
        for name in self.fields {
            if fields.iter().any(|f| f.name == name) {
                return Err(ConfigError::Duplicate {
                    role: "fields",
                    field: name,
                });
            }
            if !self.schema.has_field(&name) {
                return Err(ConfigError::UnknownModelField {
                    model: self.schema.name.clone(),
                    field: name,
                });
            }
            fields.push(FieldSpec { name, locator: None });
        }

        for (field, locator) in self.field_map {
            match fields.iter_mut().find(|f| f.name == field) {
                Some(spec) => spec.locator = Some(locator),
                None => {
                    return Err(ConfigError::UndeclaredField {
                        role: "field_map",
                        field,
                    })
                }
            }
        }

        let mut unique_fields: Vec<String> = Vec::with_capacity(self.unique_fields.len());
        for field in self.unique_fields {
            if unique_fields.contains(&field) {
                return Err(ConfigError::Duplicate {
                    role: "unique_fields",
                    field,
                });
            }
            if !fields.iter().any(|f| f.name == field) {
                return Err(ConfigError::UndeclaredField {
                    role: "unique_fields",
                    field,
                });
            }
            unique_fields.push(field);
        }

        let mut extractors = HashMap::with_capacity(self.extractors.len());
        for (field, extract) in self.extractors {
            if !fields.iter().any(|f| f.name == field) {
                return Err(ConfigError::UndeclaredField {
                    role: "extractors",
                    field,
                });
            }
            if extractors.contains_key(&field) {
                return Err(ConfigError::Duplicate {
                    role: "extractors",
                    field,
                });
            }
            extractors.insert(field, extract);
        }

        Ok(ImporterConfig {
            schema: self.schema,
            fields,
            unique_fields,
            extractors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CsvAdapter;
    use crate::record::{FieldDef, FieldKind};

    fn schema() -> Arc<ModelSchema> {
        Arc::new(
            ModelSchema::new("event")
                .with_field(FieldDef::new("name", FieldKind::text()))
                .with_field(FieldDef::new("date", FieldKind::text()))
                .with_field(FieldDef::new("notes", FieldKind::text()).nullable()),
        )
    }

    fn builder() -> ImporterConfigBuilder<CsvAdapter> {
        ImporterConfig::builder(schema())
    }

    #[test]
    fn resolve_defaults_to_field_name() {
        let config = builder()
            .fields(["name", "date"])
            .map("name", "Name")
            .build()
            .unwrap();
        assert_eq!(config.resolve("name"), "Name");
        assert_eq!(config.resolve("date"), "date");
    }

    #[test]
    fn fields_keep_declaration_order() {
        let config = builder().fields(["notes", "name", "date"]).build().unwrap();
        assert_eq!(
            config.field_names().collect::<Vec<_>>(),
            vec!["notes", "name", "date"]
        );
    }

    #[test]
    fn rejects_duplicate_fields() {
        let err = builder().fields(["name", "name"]).build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Duplicate {
                role: "fields",
                field: "name".to_string()
            }
        );
    }

    #[test]
    fn rejects_fields_missing_from_model() {
        let err = builder().field("title").build().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModelField { .. }));
    }

    #[test]
    fn rejects_undeclared_unique_and_mapped_fields() {
        let err = builder().field("name").unique(["date"]).build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UndeclaredField {
                role: "unique_fields",
                field: "date".to_string()
            }
        );

        let err = builder().field("name").map("date", "Date").build().unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredField { role: "field_map", .. }));
    }

    #[test]
    fn rejects_extractor_for_undeclared_field() {
        let err = builder()
            .field("name")
            .extractor("date", |_| Ok(FieldValue::Null))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredField { role: "extractors", .. }));
    }

    #[test]
    fn debug_lists_extractor_names() {
        let config = builder()
            .fields(["name", "date"])
            .extractor("date", |_| Ok(FieldValue::Null))
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("extractors: [\"date\"]"));
    }
}
