//! Quoted identifiers and composite schema ids.
//!
//! Firebird folds unquoted identifiers to upper case, so every object name that comes from
//! the catalog or from the user is wrapped in double quotes before it is placed in a
//! statement. Quoting is a plain wrap: a raw name that itself contains the quote character
//! is not escaped and produces a broken identifier.

/// Quote character used for Firebird identifiers.
pub const QUOTE_CHAR: char = '"';

/// Wraps the trimmed `raw` name in `quote` on both sides.
pub fn make_safe_identifier(raw: &str, quote: char) -> String {
    format!("{quote}{}{quote}", raw.trim())
}

/// [`make_safe_identifier`] with the Firebird quote character.
pub fn quote_identifier(raw: &str) -> String {
    make_safe_identifier(raw, QUOTE_CHAR)
}

/// Returns whether `name` is already quoted, ignoring surrounding whitespace.
pub fn is_escaped(name: &str) -> bool {
    name.trim().starts_with(QUOTE_CHAR)
}

/// The segments of a schema id.
///
/// A Firebird database has a single schema; multi-database setups use the leading segment
/// to select the database a connection is opened against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecomposedName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl DecomposedName {
    /// Returns whether the id could not be split into known segments.
    pub fn is_empty(&self) -> bool {
        self.database.is_empty() && self.schema.is_empty() && self.table.is_empty()
    }

    /// Strips `quote` from both ends of every segment.
    pub fn trim_quotes(self, quote: char) -> DecomposedName {
        DecomposedName {
            database: self.database.trim_matches(quote).to_string(),
            schema: self.schema.trim_matches(quote).to_string(),
            table: self.table.trim_matches(quote).to_string(),
        }
    }
}

/// Splits a schema id on `.`.
///
/// One segment is a table, two are `schema.table`, three are `database.schema.table`. Any
/// other shape yields an empty [`DecomposedName`].
pub fn decompose_qualified_id(id: &str) -> DecomposedName {
    let parts: Vec<&str> = id.split('.').collect();

    match parts.as_slice() {
        [table] => DecomposedName {
            table: table.to_string(),
            ..Default::default()
        },
        [schema, table] => DecomposedName {
            schema: schema.to_string(),
            table: table.to_string(),
            ..Default::default()
        },
        [database, schema, table] => DecomposedName {
            database: database.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
        },
        _ => DecomposedName::default(),
    }
}

/// Splits a schema id and strips the Firebird quote character from each segment.
pub fn decompose_safe_id(id: &str) -> DecomposedName {
    decompose_qualified_id(id).trim_quotes(QUOTE_CHAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_trimmed_name() {
        assert_eq!(make_safe_identifier("  Orders ", '"'), "\"Orders\"");
        assert_eq!(make_safe_identifier("Orders", '`'), "`Orders`");
    }

    #[test]
    fn round_trips_single_table() {
        for raw in ["Orders", "PERSONS", "lower_case", "with space"] {
            assert_eq!(decompose_safe_id(&quote_identifier(raw)).table, raw);
        }
    }

    #[test]
    fn decomposes_two_and_three_segments() {
        let two = decompose_qualified_id("db.Orders");
        assert_eq!(two.schema, "db");
        assert_eq!(two.table, "Orders");
        assert!(two.database.is_empty());

        let three = decompose_safe_id("\"main\".\"app\".\"Orders\"");
        assert_eq!(three.database, "main");
        assert_eq!(three.schema, "app");
        assert_eq!(three.table, "Orders");
    }

    #[test]
    fn unparseable_ids_are_empty() {
        assert!(decompose_qualified_id("a.b.c.d").is_empty());
        assert!(decompose_qualified_id("").is_empty());
    }

    #[test]
    fn embedded_quotes_are_not_escaped() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"b\"");
    }

    #[test]
    fn detects_escaped_names() {
        assert!(is_escaped(" \"Name\""));
        assert!(!is_escaped("NAME"));
    }
}
