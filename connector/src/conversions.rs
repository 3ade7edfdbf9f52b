//! Conversions between driver cells and JSON record values.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use firebird::types::{Cell, PropertyType};
use serde_json::{Number, Value};

use crate::bail;
use crate::error::{ConnectorResult, ErrorKind};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Renders a cell as a JSON value.
///
/// Exact numerics are rendered as strings so no precision is lost, binary values as base64
/// and temporal values in ISO 8601.
pub fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(value) => Value::Bool(*value),
        Cell::String(value) => Value::String(value.clone()),
        Cell::I16(value) => Value::from(*value),
        Cell::I32(value) => Value::from(*value),
        Cell::I64(value) => Value::from(*value),
        Cell::I128(value) => match i64::try_from(*value) {
            Ok(value) => Value::from(value),
            Err(_) => Value::String(value.to_string()),
        },
        Cell::F32(value) => float_to_json(f64::from(*value)),
        Cell::F64(value) => float_to_json(*value),
        Cell::Numeric(value) => Value::String(value.normalized().to_string()),
        Cell::Date(value) => Value::String(value.format(DATE_FORMAT).to_string()),
        Cell::Time(value) => Value::String(value.format(TIME_FORMAT).to_string()),
        Cell::Timestamp(value) => Value::String(value.format(TIMESTAMP_FORMATS[0]).to_string()),
        Cell::TimestampTz(value) => Value::String(value.to_rfc3339()),
        Cell::Bytes(value) => Value::String(STANDARD.encode(value)),
    }
}

fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Converts a JSON value without a known target type.
///
/// Nested arrays and objects are bound as their JSON text.
pub fn json_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(value) => Cell::Bool(*value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Cell::I64(value),
            None => number.as_f64().map_or(Cell::Null, Cell::F64),
        },
        Value::String(value) => Cell::String(value.clone()),
        Value::Array(_) | Value::Object(_) => Cell::String(value.to_string()),
    }
}

/// Converts a JSON value into a cell of the given portable type.
pub fn json_to_typed_cell(value: &Value, property_type: PropertyType) -> ConnectorResult<Cell> {
    if value.is_null() {
        return Ok(Cell::Null);
    }

    let cell = match property_type {
        PropertyType::Integer => match value {
            Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::I64(value),
                None => bail!(
                    ErrorKind::ConversionError,
                    "Value is not an integer",
                    number.to_string()
                ),
            },
            Value::String(text) => Cell::I64(text.trim().parse()?),
            other => bail!(ErrorKind::ConversionError, "Value is not an integer", other),
        },
        PropertyType::Decimal => Cell::Numeric(BigDecimal::from_str(&text_of(value))?),
        PropertyType::Float => match value {
            Value::Number(number) => number.as_f64().map_or(Cell::Null, Cell::F64),
            Value::String(text) => match text.trim().parse::<f64>() {
                Ok(value) => Cell::F64(value),
                Err(err) => bail!(ErrorKind::ConversionError, "Value is not a float", err),
            },
            other => bail!(ErrorKind::ConversionError, "Value is not a float", other),
        },
        PropertyType::Bool => match value {
            Value::Bool(value) => Cell::Bool(*value),
            Value::Number(number) => Cell::Bool(number.as_i64().unwrap_or(0) != 0),
            Value::String(text) => match text.trim().to_lowercase().as_str() {
                "true" | "1" => Cell::Bool(true),
                "false" | "0" => Cell::Bool(false),
                _ => bail!(ErrorKind::ConversionError, "Value is not a boolean", text),
            },
            other => bail!(ErrorKind::ConversionError, "Value is not a boolean", other),
        },
        PropertyType::Date => {
            Cell::Date(NaiveDate::parse_from_str(text_of(value).trim(), DATE_FORMAT)?)
        }
        PropertyType::Time => {
            Cell::Time(NaiveTime::parse_from_str(text_of(value).trim(), TIME_FORMAT)?)
        }
        PropertyType::Datetime => parse_timestamp(text_of(value).trim())?,
        PropertyType::Blob => match value {
            Value::String(text) => Cell::Bytes(STANDARD.decode(text.trim())?),
            other => Cell::Bytes(other.to_string().into_bytes()),
        },
        PropertyType::String | PropertyType::Text => Cell::String(text_of(value)),
    };

    Ok(cell)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_timestamp(text: &str) -> ConnectorResult<Cell> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Cell::Timestamp(value));
        }
    }

    let value = DateTime::parse_from_rfc3339(text)?;
    Ok(Cell::TimestampTz(value.to_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_cells_as_json() {
        assert_eq!(cell_to_json(&Cell::Null), Value::Null);
        assert_eq!(cell_to_json(&Cell::I32(5)), json!(5));
        assert_eq!(cell_to_json(&Cell::I128(i128::MAX)), json!(i128::MAX.to_string()));
        assert_eq!(cell_to_json(&Cell::F64(f64::NAN)), Value::Null);
        assert_eq!(
            cell_to_json(&Cell::Numeric(BigDecimal::from_str("12.50").unwrap())),
            json!("12.5")
        );
        assert_eq!(cell_to_json(&Cell::Bytes(b"hi".to_vec())), json!("aGk="));
        assert_eq!(
            cell_to_json(&Cell::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
            json!("2024-02-29")
        );
    }

    #[test]
    fn untyped_conversion_keeps_json_shape() {
        assert_eq!(json_to_cell(&json!(3)), Cell::I64(3));
        assert_eq!(json_to_cell(&json!(1.5)), Cell::F64(1.5));
        assert_eq!(json_to_cell(&json!(["a", "b"])), Cell::String("[\"a\",\"b\"]".to_string()));
    }

    #[test]
    fn typed_conversion_parses_strings() {
        assert_eq!(
            json_to_typed_cell(&json!("42"), PropertyType::Integer).unwrap(),
            Cell::I64(42)
        );
        assert_eq!(
            json_to_typed_cell(&json!("yes"), PropertyType::String).unwrap(),
            Cell::String("yes".to_string())
        );
        assert_eq!(
            json_to_typed_cell(&json!("2024-01-02 03:04:05"), PropertyType::Datetime).unwrap(),
            Cell::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(3, 4, 5)
                    .unwrap()
            )
        );
        assert_eq!(
            json_to_typed_cell(&json!("aGk="), PropertyType::Blob).unwrap(),
            Cell::Bytes(b"hi".to_vec())
        );
        assert_eq!(json_to_typed_cell(&Value::Null, PropertyType::Date).unwrap(), Cell::Null);
    }

    #[test]
    fn typed_conversion_rejects_bad_values() {
        let err = json_to_typed_cell(&json!("abc"), PropertyType::Integer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);

        assert!(json_to_typed_cell(&json!({"a": 1}), PropertyType::Bool).is_err());
        assert!(json_to_typed_cell(&json!("2024-13-01"), PropertyType::Date).is_err());
    }
}
