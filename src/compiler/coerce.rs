//! Literal coercion to the mapped column type
//!
//! Request parsers hand over most literals as text. Before binding, a literal
//! is converted to the type declared for the property it is compared with, so
//! the database compares like with like.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{QueryError, QueryResult};
use crate::filter::ScalarValue;
use crate::mapping::ValueType;

pub fn coerce(property: &str, value: &ScalarValue, target: ValueType) -> QueryResult<ScalarValue> {
    let invalid = || QueryError::InvalidLiteral {
        property: property.to_string(),
        value: value.to_string(),
        expected: target.as_str(),
    };

    let coerced = match (target, value) {
        (ValueType::Geometry, _) => {
            return Err(QueryError::unsupported_shape(format!(
                "geometry property '{}' only supports spatial operators",
                property
            )))
        }
        (_, ScalarValue::Null) => ScalarValue::Null,

        (ValueType::Text, ScalarValue::Text(_)) => value.clone(),
        (ValueType::Text, ScalarValue::Bytes(_)) => return Err(invalid()),
        (ValueType::Text, other) => ScalarValue::Text(other.to_string()),

        (ValueType::Integer, ScalarValue::Integer(_)) => value.clone(),
        (ValueType::Integer, ScalarValue::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
            ScalarValue::Integer(*f as i64)
        }
        (ValueType::Integer, ScalarValue::Text(s)) => {
            ScalarValue::Integer(s.trim().parse().map_err(|_| invalid())?)
        }

        (ValueType::Float, ScalarValue::Float(_)) => value.clone(),
        (ValueType::Float, ScalarValue::Integer(i)) => ScalarValue::Float(*i as f64),
        (ValueType::Float, ScalarValue::Text(s)) => {
            ScalarValue::Float(s.trim().parse().map_err(|_| invalid())?)
        }

        (ValueType::Boolean, ScalarValue::Bool(_)) => value.clone(),
        (ValueType::Boolean, ScalarValue::Integer(0)) => ScalarValue::Bool(false),
        (ValueType::Boolean, ScalarValue::Integer(1)) => ScalarValue::Bool(true),
        (ValueType::Boolean, ScalarValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => ScalarValue::Bool(true),
            "false" | "0" => ScalarValue::Bool(false),
            _ => return Err(invalid()),
        },

        (ValueType::Timestamp, ScalarValue::Timestamp(_)) => value.clone(),
        (ValueType::Timestamp, ScalarValue::Text(s)) => {
            ScalarValue::Timestamp(parse_timestamp(s).ok_or_else(invalid)?)
        }

        _ => return Err(invalid()),
    };

    Ok(coerced)
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or a bare
/// date (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
