//! Firebird native types and their portable counterparts.

mod cell;
mod mapper;

pub use cell::Cell;
pub use mapper::{
    map_portable_type, map_portable_type_to_ddl, map_source_ddl_type, native_type_name,
    TEXT_LENGTH_THRESHOLD,
};

use serde::{Deserialize, Serialize};

/// Native type names produced by the catalog queries.
pub mod native {
    pub const SMALLINT: &str = "SMALLINT";
    pub const INTEGER: &str = "INTEGER";
    pub const BIGINT: &str = "BIGINT";
    pub const INT128: &str = "INT128";
    pub const NUMERIC: &str = "NUMERIC";
    pub const DECIMAL: &str = "DECIMAL";
    pub const DECFLOAT16: &str = "DECFLOAT(16)";
    pub const DECFLOAT34: &str = "DECFLOAT(34)";
    pub const FLOAT: &str = "FLOAT";
    pub const DOUBLE_PRECISION: &str = "DOUBLE PRECISION";
    pub const DATE: &str = "DATE";
    pub const TIME: &str = "TIME";
    pub const TIME_TZ: &str = "TIME W/TIME ZONE";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const TIMESTAMP_TZ: &str = "TIMESTAMP W/TIME ZONE";
    pub const CHAR: &str = "CHAR";
    pub const VARCHAR: &str = "VARCHAR";
    pub const BOOLEAN: &str = "BOOLEAN";
    pub const TEXT: &str = "TEXT";
    pub const BLOB: &str = "BLOB";
    pub const OTHER: &str = "OTHER";
}

/// Store-independent type of a discovered property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Datetime,
    Date,
    Time,
    Integer,
    Decimal,
    Float,
    Bool,
    Blob,
    #[default]
    String,
    Text,
}

impl PropertyType {
    /// Every variant, in declaration order.
    pub const ALL: [PropertyType; 10] = [
        PropertyType::Datetime,
        PropertyType::Date,
        PropertyType::Time,
        PropertyType::Integer,
        PropertyType::Decimal,
        PropertyType::Float,
        PropertyType::Bool,
        PropertyType::Blob,
        PropertyType::String,
        PropertyType::Text,
    ];
}
