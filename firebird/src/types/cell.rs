use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A single value read from or bound to a Firebird statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    String(String),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    F32(f32),
    F64(f64),
    Numeric(BigDecimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the value of a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value of any integer cell that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::I16(value) => Some(i64::from(*value)),
            Cell::I32(value) => Some(i64::from(*value)),
            Cell::I64(value) => Some(*value),
            Cell::I128(value) => i64::try_from(*value).ok(),
            Cell::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Renders the cell as trimmed text.
    ///
    /// Catalog columns are fixed width `CHAR`s padded with spaces, so every name read from
    /// the catalog goes through this.
    pub fn to_trimmed_string(&self) -> Option<String> {
        let text = match self {
            Cell::Null => return None,
            Cell::Bool(value) => value.to_string(),
            Cell::String(value) => value.trim().to_string(),
            Cell::I16(value) => value.to_string(),
            Cell::I32(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::I128(value) => value.to_string(),
            Cell::F32(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::Numeric(value) => value.to_string(),
            Cell::Date(value) => value.to_string(),
            Cell::Time(value) => value.to_string(),
            Cell::Timestamp(value) => value.to_string(),
            Cell::TimestampTz(value) => value.to_rfc3339(),
            Cell::Bytes(value) => String::from_utf8_lossy(value).trim().to_string(),
        };

        Some(text)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_padded_catalog_text() {
        assert_eq!(
            Cell::from("PERSONS                        ").to_trimmed_string(),
            Some("PERSONS".to_string())
        );
        assert_eq!(Cell::Null.to_trimmed_string(), None);
    }

    #[test]
    fn reads_integers_of_any_width() {
        assert_eq!(Cell::I16(7).as_i64(), Some(7));
        assert_eq!(Cell::I128(i128::MAX).as_i64(), None);
        assert_eq!(Cell::from(" 42 ").as_i64(), Some(42));
        assert_eq!(Cell::Bool(true).as_i64(), None);
    }

    #[test]
    fn optional_values_become_null() {
        assert_eq!(Cell::from(None::<String>), Cell::Null);
        assert_eq!(Cell::from(Some(3_i64)), Cell::I64(3));
    }
}
