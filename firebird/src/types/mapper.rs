use super::PropertyType;
use super::native;

/// Character columns longer than this are reported as [`PropertyType::Text`].
pub const TEXT_LENGTH_THRESHOLD: i64 = 1024;

fn normalize(native_type: &str) -> String {
    native_type.trim().to_uppercase()
}

/// Maps a native type name to its portable type.
///
/// The mapping is total: unknown names become [`PropertyType::String`].
pub fn map_portable_type(native_type: &str, length: Option<i64>) -> PropertyType {
    match normalize(native_type).as_str() {
        native::TIMESTAMP | native::TIMESTAMP_TZ => PropertyType::Datetime,
        native::DATE => PropertyType::Date,
        native::TIME | native::TIME_TZ => PropertyType::Time,
        native::SMALLINT | native::INTEGER | native::BIGINT | native::INT128 => {
            PropertyType::Integer
        }
        native::DECIMAL | native::NUMERIC | native::DECFLOAT16 | native::DECFLOAT34 => {
            PropertyType::Decimal
        }
        native::FLOAT | native::DOUBLE_PRECISION => PropertyType::Float,
        native::BOOLEAN => PropertyType::Bool,
        native::BLOB => PropertyType::Blob,
        native::CHAR | native::VARCHAR => match length {
            Some(length) if length > TEXT_LENGTH_THRESHOLD => PropertyType::Text,
            _ => PropertyType::String,
        },
        native::TEXT => PropertyType::Text,
        _ => PropertyType::String,
    }
}

/// Builds the DDL fragment that recreates a column of the given native type.
pub fn map_source_ddl_type(
    native_type: &str,
    length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    let normalized = normalize(native_type);

    match (normalized.as_str(), length, precision) {
        (native::CHAR | native::VARCHAR, Some(length), _) => format!("{normalized}({length})"),
        (native::NUMERIC | native::DECIMAL, _, Some(precision)) => match scale {
            Some(scale) => format!("{normalized}({precision},{scale})"),
            None => format!("{normalized}({precision})"),
        },
        (native::TEXT, _, _) => "BLOB SUB_TYPE 1".to_string(),
        (native::TIME_TZ, _, _) => "TIME WITH TIME ZONE".to_string(),
        (native::TIMESTAMP_TZ, _, _) => "TIMESTAMP WITH TIME ZONE".to_string(),
        (native::OTHER, _, _) => "VARCHAR(255)".to_string(),
        _ => native_type.trim().to_string(),
    }
}

/// DDL used for columns that have no source type, such as synthetic replication columns.
pub fn map_portable_type_to_ddl(property_type: PropertyType) -> &'static str {
    match property_type {
        PropertyType::Datetime => "TIMESTAMP",
        PropertyType::Date => "DATE",
        PropertyType::Time => "TIME",
        PropertyType::Integer => "INTEGER",
        PropertyType::Decimal => "DECIMAL(38,18)",
        PropertyType::Float => "DOUBLE PRECISION",
        PropertyType::Bool => "BOOLEAN",
        PropertyType::Blob => "BLOB",
        PropertyType::String => "VARCHAR(255)",
        PropertyType::Text => "BLOB SUB_TYPE 1",
    }
}

/// Decodes `RDB$FIELD_TYPE` and `RDB$FIELD_SUB_TYPE` into a native type name.
///
/// Mirrors the `CASE` expression embedded in the catalog queries.
pub fn native_type_name(field_type: i16, sub_type: Option<i16>) -> &'static str {
    match (field_type, sub_type) {
        (7 | 8 | 16 | 26, Some(1)) => native::NUMERIC,
        (7 | 8 | 16 | 26, Some(2)) => native::DECIMAL,
        (261, Some(1)) => native::TEXT,
        (7, _) => native::SMALLINT,
        (8, _) => native::INTEGER,
        (10, _) => native::FLOAT,
        (12, _) => native::DATE,
        (13, _) => native::TIME,
        (14, _) => native::CHAR,
        (16, _) => native::BIGINT,
        (23, _) => native::BOOLEAN,
        (24, _) => native::DECFLOAT16,
        (25, _) => native::DECFLOAT34,
        (26, _) => native::INT128,
        (27, _) => native::DOUBLE_PRECISION,
        (28, _) => native::TIME_TZ,
        (29, _) => native::TIMESTAMP_TZ,
        (35, _) => native::TIMESTAMP,
        (37, _) => native::VARCHAR,
        (261, _) => native::BLOB,
        _ => native::OTHER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_native_types() {
        let cases = [
            ("TIMESTAMP", PropertyType::Datetime),
            ("TIMESTAMP W/TIME ZONE", PropertyType::Datetime),
            ("DATE", PropertyType::Date),
            ("TIME W/TIME ZONE", PropertyType::Time),
            ("SMALLINT", PropertyType::Integer),
            ("INT128", PropertyType::Integer),
            ("NUMERIC", PropertyType::Decimal),
            ("DECFLOAT(34)", PropertyType::Decimal),
            ("DOUBLE PRECISION", PropertyType::Float),
            ("BOOLEAN", PropertyType::Bool),
            ("BLOB", PropertyType::Blob),
            ("TEXT", PropertyType::Text),
            ("VARCHAR", PropertyType::String),
        ];

        for (native_type, expected) in cases {
            assert_eq!(map_portable_type(native_type, None), expected, "{native_type}");
        }
    }

    #[test]
    fn unknown_types_default_to_string() {
        for native_type in ["OTHER", "GEOMETRY", "", "   "] {
            assert_eq!(map_portable_type(native_type, Some(10)), PropertyType::String);
        }
    }

    #[test]
    fn catalog_padding_and_case_are_ignored() {
        assert_eq!(map_portable_type("integer        ", None), PropertyType::Integer);
    }

    #[test]
    fn long_character_columns_become_text() {
        assert_eq!(map_portable_type("VARCHAR", Some(255)), PropertyType::String);
        assert_eq!(map_portable_type("VARCHAR", Some(1024)), PropertyType::String);
        assert_eq!(map_portable_type("VARCHAR", Some(2000)), PropertyType::Text);
        assert_eq!(map_portable_type("CHAR", Some(1025)), PropertyType::Text);
    }

    #[test]
    fn builds_source_ddl() {
        assert_eq!(map_source_ddl_type("VARCHAR", Some(50), None, None), "VARCHAR(50)");
        assert_eq!(map_source_ddl_type("CHAR", None, None, None), "CHAR");
        assert_eq!(map_source_ddl_type("NUMERIC", None, Some(18), Some(4)), "NUMERIC(18,4)");
        assert_eq!(map_source_ddl_type("DECIMAL", None, Some(9), None), "DECIMAL(9)");
        assert_eq!(map_source_ddl_type("TEXT", Some(80), None, None), "BLOB SUB_TYPE 1");
        assert_eq!(
            map_source_ddl_type("TIME W/TIME ZONE", None, None, None),
            "TIME WITH TIME ZONE"
        );
        assert_eq!(
            map_source_ddl_type("TIMESTAMP W/TIME ZONE", None, None, None),
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(map_source_ddl_type("OTHER", None, None, None), "VARCHAR(255)");
        assert_eq!(map_source_ddl_type("INTEGER ", None, None, None), "INTEGER");
    }

    #[test]
    fn every_portable_type_has_ddl() {
        for property_type in PropertyType::ALL {
            assert!(!map_portable_type_to_ddl(property_type).is_empty());
        }
        assert_eq!(map_portable_type_to_ddl(PropertyType::Text), "BLOB SUB_TYPE 1");
    }

    #[test]
    fn decodes_field_type_codes() {
        assert_eq!(native_type_name(8, Some(0)), "INTEGER");
        assert_eq!(native_type_name(8, Some(2)), "DECIMAL");
        assert_eq!(native_type_name(16, Some(1)), "NUMERIC");
        assert_eq!(native_type_name(261, Some(1)), "TEXT");
        assert_eq!(native_type_name(261, Some(0)), "BLOB");
        assert_eq!(native_type_name(37, None), "VARCHAR");
        assert_eq!(native_type_name(29, None), "TIMESTAMP W/TIME ZONE");
        assert_eq!(native_type_name(45, None), "OTHER");
    }
}
