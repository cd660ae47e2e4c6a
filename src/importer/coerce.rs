//! Named value coercions for declarative import specs
//!
//! A coercion turns the adapter's raw text into a typed [`FieldValue`].
//! Missing text is always `Null`; coercions only apply to text that exists.

use super::config::ExtractError;
use crate::record::FieldValue;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Coercion {
    /// Keep the text as-is
    Text,
    /// Empty text becomes `Null`
    NullIfEmpty,
    Int,
    /// Integer, or 0 when the text is not a number
    IntOrZero,
    Float,
    /// true/false, yes/no, 1/0 (case-insensitive)
    Bool,
    /// Date with an optional chrono format, `%Y-%m-%d` by default
    Date(Option<String>),
    /// `HH:MM:SS` or `HH:MM`
    Time,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown coercion '{0}'")]
pub struct UnknownCoercion(pub String);

impl FromStr for Coercion {
    type Err = UnknownCoercion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(format) = s.strip_prefix("date:") {
            return Ok(Coercion::Date(Some(format.to_string())));
        }
        match s {
            "text" => Ok(Coercion::Text),
            "null_if_empty" => Ok(Coercion::NullIfEmpty),
            "int" => Ok(Coercion::Int),
            "int_or_zero" => Ok(Coercion::IntOrZero),
            "float" => Ok(Coercion::Float),
            "bool" => Ok(Coercion::Bool),
            "date" => Ok(Coercion::Date(None)),
            "time" => Ok(Coercion::Time),
            other => Err(UnknownCoercion(other.to_string())),
        }
    }
}

impl TryFrom<String> for Coercion {
    type Error = UnknownCoercion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coercion::Text => write!(f, "text"),
            Coercion::NullIfEmpty => write!(f, "null_if_empty"),
            Coercion::Int => write!(f, "int"),
            Coercion::IntOrZero => write!(f, "int_or_zero"),
            Coercion::Float => write!(f, "float"),
            Coercion::Bool => write!(f, "bool"),
            Coercion::Date(None) => write!(f, "date"),
            Coercion::Date(Some(format)) => write!(f, "date:{}", format),
            Coercion::Time => write!(f, "time"),
        }
    }
}

impl Coercion {
    pub fn apply(&self, field: &str, raw: Option<String>) -> Result<FieldValue, ExtractError> {
        let Some(raw) = raw else {
            return Ok(FieldValue::Null);
        };
        let fail = |reason: String| invalid(field, &raw, reason);

        match self {
            Coercion::Text => Ok(FieldValue::Text(raw.clone())),
            Coercion::NullIfEmpty if raw.is_empty() => Ok(FieldValue::Null),
            Coercion::NullIfEmpty => Ok(FieldValue::Text(raw.clone())),
            Coercion::Int => raw
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|e| fail(e.to_string())),
            Coercion::IntOrZero => Ok(FieldValue::Int(raw.parse().unwrap_or(0))),
            Coercion::Float => raw
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| fail(e.to_string())),
            Coercion::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "no" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(fail("expected a boolean".to_string())),
            },
            Coercion::Date(format) => {
                let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
                NaiveDate::parse_from_str(&raw, format)
                    .map(FieldValue::Date)
                    .map_err(|e| fail(e.to_string()))
            }
            Coercion::Time => parse_time(&raw)
                .map(FieldValue::Time)
                .ok_or_else(|| fail("expected HH:MM or HH:MM:SS".to_string())),
        }
    }
}

fn invalid(field: &str, raw: &str, reason: String) -> ExtractError {
    ExtractError::Invalid {
        field: field.to_string(),
        value: raw.to_string(),
        reason,
    }
}

/// Parse `HH:MM:SS`, falling back to `HH:MM`
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn parses_names() {
        assert_eq!("int_or_zero".parse::<Coercion>().unwrap(), Coercion::IntOrZero);
        assert_eq!(
            "date:%d/%m/%Y".parse::<Coercion>().unwrap(),
            Coercion::Date(Some("%d/%m/%Y".to_string()))
        );
        assert!("decimal".parse::<Coercion>().is_err());
        assert_eq!(Coercion::Date(Some("%d/%m".to_string())).to_string(), "date:%d/%m");
    }

    #[test]
    fn missing_text_is_null_for_every_coercion() {
        for coercion in [Coercion::Int, Coercion::Bool, Coercion::Time, Coercion::Date(None)] {
            assert_eq!(coercion.apply("f", None).unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn int_or_zero_swallows_garbage() {
        assert_eq!(Coercion::IntOrZero.apply("f", some("42")).unwrap(), FieldValue::Int(42));
        assert_eq!(Coercion::IntOrZero.apply("f", some("n/a")).unwrap(), FieldValue::Int(0));
        assert!(Coercion::Int.apply("f", some("n/a")).is_err());
    }

    #[test]
    fn dates_and_times() {
        assert_eq!(
            Coercion::Date(Some("%d/%m/%Y".to_string()))
                .apply("f", some("03/02/2022"))
                .unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2022, 2, 3).unwrap())
        );
        assert_eq!(
            Coercion::Time.apply("f", some("08:30")).unwrap(),
            FieldValue::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap())
        );
        let err = Coercion::Time.apply("start", some("later")).unwrap_err();
        assert!(err.to_string().contains("start"));
    }

    #[test]
    fn null_if_empty_and_bool() {
        assert_eq!(Coercion::NullIfEmpty.apply("f", some("")).unwrap(), FieldValue::Null);
        assert_eq!(Coercion::Bool.apply("f", some("Yes")).unwrap(), FieldValue::Bool(true));
        assert!(Coercion::Bool.apply("f", some("maybe")).is_err());
    }
}
