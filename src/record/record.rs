//! Records: instances of a model, either new or loaded from a store

use super::schema::{ModelSchema, ValidationError};
use super::value::{FieldValue, RecordId, RecordRef};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from mutating a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },
}

/// A record of some model
///
/// New records have no id and every declared field set to `Null`.
/// The id is assigned by the store when the record is first saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<RecordId>,
    schema: Arc<ModelSchema>,
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an unsaved record with all fields at their defaults
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let values = schema
            .field_names()
            .map(|name| (name.to_string(), FieldValue::Null))
            .collect();
        Self {
            id: None,
            schema,
            values,
        }
    }

    /// Rebuild a stored record. Values for fields the schema no longer
    /// declares are dropped; newly declared fields start as `Null`.
    pub(crate) fn from_stored(
        schema: Arc<ModelSchema>,
        id: RecordId,
        mut stored: BTreeMap<String, FieldValue>,
    ) -> Self {
        let mut record = Self::new(schema);
        for (name, value) in record.values.iter_mut() {
            if let Some(v) = stored.remove(name) {
                *value = v;
            }
        }
        record.id = Some(id);
        record
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn model(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Assign a field, overwriting any previous value
    pub fn set(&mut self, field: &str, value: FieldValue) -> Result<(), RecordError> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RecordError::UnknownField {
                model: self.schema.name.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Result<Self, RecordError> {
        self.set(field, value.into())?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schema.validate(&self.values)
    }

    /// A reference to this record, once it has been saved
    pub fn reference(&self) -> Option<RecordRef> {
        self.id.map(|id| RecordRef::new(self.schema.name.clone(), id))
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }
}
