//! Per-item failures captured during a run

use super::parsed::ParsedRecord;
use serde::Serialize;
use std::error::Error;

/// One item that failed to persist
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    /// 1-based position of the item in the source
    pub index: usize,
    /// The values parsed from the item
    pub data: ParsedRecord,
    /// The error followed by its causes, one per line
    pub trace: String,
}

/// Render an error and its `source()` chain.
///
/// ```
/// use importkit::importer::format_trace;
///
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// assert_eq!(format_trace(&err), "disk full");
/// ```
pub fn format_trace(err: &(dyn Error + 'static)) -> String {
    let mut trace = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        trace.push_str("\n  caused by: ");
        trace.push_str(&inner.to_string());
        cause = inner.source();
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ValidationError;
    use crate::storage::StorageError;

    #[test]
    fn trace_includes_causes() {
        let err = StorageError::Validation {
            model: "task".to_string(),
            source: ValidationError::Required {
                field: "category".to_string(),
            },
        };
        assert_eq!(
            format_trace(&err),
            "Validation failed for task\n  caused by: field 'category' is required"
        );
    }
}
