//! Catalog queries and the column aliases they return.
//!
//! Names are bound as parameters. System relations and procedures (`RDB$`, `MON$`, `SEC$`)
//! are filtered inside the queries by their fourth character.

/// Decodes `f.RDB$FIELD_TYPE` and `f.RDB$FIELD_SUB_TYPE` into the native type vocabulary.
///
/// Kept in sync with [`crate::types::native_type_name`].
macro_rules! native_type_case {
    () => {
        "CASE \
            WHEN f.RDB$FIELD_TYPE IN (7, 8, 16, 26) AND f.RDB$FIELD_SUB_TYPE = 1 THEN 'NUMERIC' \
            WHEN f.RDB$FIELD_TYPE IN (7, 8, 16, 26) AND f.RDB$FIELD_SUB_TYPE = 2 THEN 'DECIMAL' \
            WHEN f.RDB$FIELD_TYPE = 261 AND f.RDB$FIELD_SUB_TYPE = 1 THEN 'TEXT' \
            ELSE CASE f.RDB$FIELD_TYPE \
                WHEN 7 THEN 'SMALLINT' \
                WHEN 8 THEN 'INTEGER' \
                WHEN 10 THEN 'FLOAT' \
                WHEN 12 THEN 'DATE' \
                WHEN 13 THEN 'TIME' \
                WHEN 14 THEN 'CHAR' \
                WHEN 16 THEN 'BIGINT' \
                WHEN 23 THEN 'BOOLEAN' \
                WHEN 24 THEN 'DECFLOAT(16)' \
                WHEN 25 THEN 'DECFLOAT(34)' \
                WHEN 26 THEN 'INT128' \
                WHEN 27 THEN 'DOUBLE PRECISION' \
                WHEN 28 THEN 'TIME W/TIME ZONE' \
                WHEN 29 THEN 'TIMESTAMP W/TIME ZONE' \
                WHEN 35 THEN 'TIMESTAMP' \
                WHEN 37 THEN 'VARCHAR' \
                WHEN 261 THEN 'BLOB' \
                ELSE 'OTHER' \
            END \
        END"
    };
}

/// Length, precision and scale of `f`. Scale is negated since Firebird stores it negative.
macro_rules! field_dimensions {
    () => {
        "f.RDB$CHARACTER_LENGTH AS CHARACTER_MAXIMUM_LENGTH, \
        CASE WHEN f.RDB$FIELD_TYPE IN (7, 8, 16, 26) AND f.RDB$FIELD_SUB_TYPE > 0 \
            THEN f.RDB$FIELD_PRECISION ELSE NULL END AS DATA_PRECISION, \
        CASE WHEN f.RDB$FIELD_TYPE IN (7, 8, 16, 26) AND f.RDB$FIELD_SUB_TYPE > 0 \
            THEN -f.RDB$FIELD_SCALE ELSE NULL END AS DATA_SCALE"
    };
}

macro_rules! columns_query {
    ($filter:literal) => {
        concat!(
            "SELECT r.RDB$RELATION_NAME AS TABLE_NAME, rf.RDB$FIELD_NAME AS COLUMN_NAME, ",
            native_type_case!(),
            " AS DATA_TYPE, CASE rf.RDB$NULL_FLAG WHEN 1 THEN 'NO' ELSE 'YES' END AS IS_NULLABLE, ",
            field_dimensions!(),
            " FROM RDB$RELATIONS AS r \
            JOIN RDB$RELATION_FIELDS AS rf ON rf.RDB$RELATION_NAME = r.RDB$RELATION_NAME \
            LEFT JOIN RDB$FIELDS AS f ON f.RDB$FIELD_NAME = rf.RDB$FIELD_SOURCE \
            WHERE SUBSTRING(r.RDB$RELATION_NAME FROM 4 FOR 1) <> '$'",
            $filter,
            " ORDER BY r.RDB$RELATION_NAME, rf.RDB$FIELD_POSITION"
        )
    };
}

macro_rules! primary_keys_query {
    ($filter:literal) => {
        concat!(
            "SELECT rc.RDB$RELATION_NAME AS TABLE_NAME, sg.RDB$FIELD_NAME AS PK_FIELD_NAME \
            FROM RDB$RELATION_CONSTRAINTS AS rc \
            JOIN RDB$INDEX_SEGMENTS AS sg ON sg.RDB$INDEX_NAME = rc.RDB$INDEX_NAME \
            WHERE rc.RDB$CONSTRAINT_TYPE = 'PRIMARY KEY' \
            AND SUBSTRING(rc.RDB$RELATION_NAME FROM 4 FOR 1) <> '$'",
            $filter,
            " ORDER BY rc.RDB$RELATION_NAME, sg.RDB$FIELD_POSITION"
        )
    };
}

pub const TABLE_NAME: &str = "TABLE_NAME";
pub const COLUMN_NAME: &str = "COLUMN_NAME";
pub const DATA_TYPE: &str = "DATA_TYPE";
pub const IS_NULLABLE: &str = "IS_NULLABLE";
pub const CHARACTER_MAXIMUM_LENGTH: &str = "CHARACTER_MAXIMUM_LENGTH";
pub const DATA_PRECISION: &str = "DATA_PRECISION";
pub const DATA_SCALE: &str = "DATA_SCALE";
pub const COLUMN_KEY: &str = "COLUMN_KEY";
pub const PK_FIELD_NAME: &str = "PK_FIELD_NAME";
pub const PROCEDURE_NAME: &str = "PROCEDURE_NAME";
pub const PROCEDURE_ID: &str = "PROCEDURE_ID";
pub const PARAMETER_NAME: &str = "PARAMETER_NAME";
pub const PARAMETER_NUMBER: &str = "PARAMETER_NUMBER";
pub const COUNT: &str = "C";

/// Catalog flag value meaning "yes" in `IS_NULLABLE` and `COLUMN_KEY`.
pub const FLAG_YES: &str = "YES";

/// Every user table column, ordered by table then declared position.
pub const ALL_COLUMNS_QUERY: &str = columns_query!("");

/// Columns of the table bound to the single parameter.
pub const TABLE_COLUMNS_QUERY: &str = columns_query!(" AND r.RDB$RELATION_NAME = ?");

/// Primary key segments of every user table.
pub const ALL_PRIMARY_KEYS_QUERY: &str = primary_keys_query!("");

/// Primary key segments of the table bound to the single parameter.
pub const TABLE_PRIMARY_KEYS_QUERY: &str =
    primary_keys_query!(" AND rc.RDB$RELATION_NAME = ?");

/// Columns of one table with an inline `COLUMN_KEY` flag.
///
/// Returns one row per index segment a column participates in, so a column may appear more
/// than once and callers must collapse duplicates.
pub const TABLE_COLUMNS_WITH_KEYS_QUERY: &str = concat!(
    "SELECT r.RDB$RELATION_NAME AS TABLE_NAME, rf.RDB$FIELD_NAME AS COLUMN_NAME, ",
    native_type_case!(),
    " AS DATA_TYPE, CASE rc.RDB$CONSTRAINT_TYPE WHEN 'PRIMARY KEY' THEN 'YES' ELSE 'NO' END AS COLUMN_KEY, \
    CASE rf.RDB$NULL_FLAG WHEN 1 THEN 'NO' ELSE 'YES' END AS IS_NULLABLE, ",
    field_dimensions!(),
    " FROM RDB$RELATIONS AS r \
    JOIN RDB$RELATION_FIELDS AS rf ON rf.RDB$RELATION_NAME = r.RDB$RELATION_NAME \
    LEFT JOIN RDB$FIELDS AS f ON f.RDB$FIELD_NAME = rf.RDB$FIELD_SOURCE \
    LEFT JOIN RDB$INDEX_SEGMENTS AS sg ON sg.RDB$FIELD_NAME = rf.RDB$FIELD_NAME \
    LEFT JOIN RDB$RELATION_CONSTRAINTS AS rc ON rc.RDB$RELATION_NAME = r.RDB$RELATION_NAME \
        AND rc.RDB$INDEX_NAME = sg.RDB$INDEX_NAME \
    WHERE SUBSTRING(r.RDB$RELATION_NAME FROM 4 FOR 1) <> '$' \
    AND (rc.RDB$CONSTRAINT_TYPE IS NULL OR rc.RDB$CONSTRAINT_TYPE = 'PRIMARY KEY') \
    AND NOT (rc.RDB$CONSTRAINT_NAME IS NULL AND sg.RDB$INDEX_NAME IS NOT NULL) \
    AND r.RDB$RELATION_NAME = ? \
    ORDER BY rf.RDB$FIELD_POSITION"
);

/// Counts relations with the bound name.
pub const TABLE_EXISTS_QUERY: &str =
    "SELECT COUNT(*) AS C FROM RDB$RELATIONS WHERE RDB$RELATION_NAME = ?";

/// User stored procedures.
pub const PROCEDURES_QUERY: &str = "SELECT p.RDB$PROCEDURE_NAME AS PROCEDURE_NAME, \
    p.RDB$PROCEDURE_ID AS PROCEDURE_ID \
    FROM RDB$PROCEDURES AS p \
    WHERE SUBSTRING(p.RDB$PROCEDURE_NAME FROM 4 FOR 1) <> '$' \
    ORDER BY p.RDB$PROCEDURE_NAME";

/// Input parameters of the bound procedure in parameter order.
pub const PROCEDURE_PARAMETERS_QUERY: &str = concat!(
    "SELECT pp.RDB$PARAMETER_NAME AS PARAMETER_NAME, pp.RDB$PARAMETER_NUMBER AS PARAMETER_NUMBER, ",
    native_type_case!(),
    " AS DATA_TYPE, ",
    field_dimensions!(),
    " FROM RDB$PROCEDURE_PARAMETERS AS pp \
    LEFT JOIN RDB$FIELDS AS f ON f.RDB$FIELD_NAME = pp.RDB$FIELD_SOURCE \
    WHERE pp.RDB$PROCEDURE_NAME = ? AND pp.RDB$PARAMETER_TYPE = 0 \
    ORDER BY pp.RDB$PARAMETER_NUMBER"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_queries_bind_exactly_one_name() {
        for query in [
            TABLE_COLUMNS_QUERY,
            TABLE_PRIMARY_KEYS_QUERY,
            TABLE_COLUMNS_WITH_KEYS_QUERY,
            TABLE_EXISTS_QUERY,
            PROCEDURE_PARAMETERS_QUERY,
        ] {
            assert_eq!(query.matches('?').count(), 1, "{query}");
        }

        for query in [ALL_COLUMNS_QUERY, ALL_PRIMARY_KEYS_QUERY, PROCEDURES_QUERY] {
            assert!(!query.contains('?'), "{query}");
        }
    }

    #[test]
    fn queries_exclude_system_objects() {
        for query in [
            ALL_COLUMNS_QUERY,
            ALL_PRIMARY_KEYS_QUERY,
            TABLE_COLUMNS_WITH_KEYS_QUERY,
            PROCEDURES_QUERY,
        ] {
            assert!(query.contains("FROM 4 FOR 1) <> '$'"), "{query}");
        }
    }

    #[test]
    fn column_queries_alias_expected_columns() {
        for alias in [
            TABLE_NAME,
            COLUMN_NAME,
            DATA_TYPE,
            IS_NULLABLE,
            CHARACTER_MAXIMUM_LENGTH,
            DATA_PRECISION,
            DATA_SCALE,
        ] {
            assert!(ALL_COLUMNS_QUERY.contains(&format!("AS {alias}")), "{alias}");
        }
        assert!(TABLE_COLUMNS_WITH_KEYS_QUERY.contains("AS COLUMN_KEY"));
    }
}
