//! Model schemas: the declared shape of a record type

use super::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised when a record does not satisfy its schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("field '{field}' is required")]
    Required { field: String },

    #[error("field '{field}' expects {expected}, got {found}")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' is limited to {max} characters, got {len}")]
    TooLong { field: String, max: usize, len: usize },

    #[error("field '{field}' value {value} is out of range")]
    OutOfRange { field: String, value: i64 },

    #[error("field '{field}' must reference {expected}, got {found}")]
    WrongReference {
        field: String,
        expected: String,
        found: String,
    },
}

/// The kind of value a field stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default)]
        max_length: Option<usize>,
    },
    Int {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    Float,
    Bool,
    Date,
    Time,
    Reference {
        model: String,
    },
}

impl FieldKind {
    pub fn text() -> Self {
        Self::Text { max_length: None }
    }

    pub fn text_max(max_length: usize) -> Self {
        Self::Text {
            max_length: Some(max_length),
        }
    }

    pub fn int() -> Self {
        Self::Int { min: None, max: None }
    }

    pub fn reference(model: impl Into<String>) -> Self {
        Self::Reference {
            model: model.into(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Int { .. } => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Time => "time",
            Self::Reference { .. } => "reference",
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Check a single value against this field's kind and constraints
    pub fn check(&self, value: &FieldValue) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(ValidationError::Required {
                field: self.name.clone(),
            });
        }

        match (&self.kind, value) {
            (FieldKind::Text { max_length }, FieldValue::Text(s)) => {
                let len = s.chars().count();
                match max_length {
                    Some(max) if len > *max => Err(ValidationError::TooLong {
                        field: self.name.clone(),
                        max: *max,
                        len,
                    }),
                    _ => Ok(()),
                }
            }
            (FieldKind::Int { min, max }, FieldValue::Int(n)) => {
                let below = min.is_some_and(|m| *n < m);
                let above = max.is_some_and(|m| *n > m);
                if below || above {
                    Err(ValidationError::OutOfRange {
                        field: self.name.clone(),
                        value: *n,
                    })
                } else {
                    Ok(())
                }
            }
            (FieldKind::Float, FieldValue::Float(_) | FieldValue::Int(_))
            | (FieldKind::Bool, FieldValue::Bool(_))
            | (FieldKind::Date, FieldValue::Date(_))
            | (FieldKind::Time, FieldValue::Time(_)) => Ok(()),
            (FieldKind::Reference { model }, FieldValue::Reference(r)) => {
                if &r.model == model {
                    Ok(())
                } else {
                    Err(ValidationError::WrongReference {
                        field: self.name.clone(),
                        expected: model.clone(),
                        found: r.model.clone(),
                    })
                }
            }
            (kind, other) => Err(ValidationError::WrongKind {
                field: self.name.clone(),
                expected: kind.name(),
                found: other.kind_name(),
            }),
        }
    }
}

/// The declared shape of a record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Validate a full set of values; fields absent from `values` count as null.
    ///
    /// Fields are checked in declaration order and the first failure wins.
    pub fn validate(&self, values: &BTreeMap<String, FieldValue>) -> Result<(), ValidationError> {
        for def in &self.fields {
            let value = values.get(&def.name).unwrap_or(&FieldValue::Null);
            def.check(value)?;
        }
        Ok(())
    }
}
