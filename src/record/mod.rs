//! Record model: schemas, records and typed field values

#[allow(clippy::module_inception)]
mod record;
mod schema;
mod value;

pub use record::{Record, RecordError};
pub use schema::{FieldDef, FieldKind, ModelSchema, ValidationError};
pub use value::{FieldValue, RecordId, RecordRef};
