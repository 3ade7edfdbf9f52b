use std::collections::HashMap;

use firebird::identifier::quote_identifier;

use crate::schema::{PortableProperty, PortableSchema};

#[derive(Debug, Default)]
enum AccumulatorState {
    #[default]
    NoCurrentSchema,
    AccumulatingColumns(PortableSchema),
}

/// Groups catalog column rows into schemas.
///
/// Rows must arrive ordered by table, then column position. A change of table id emits the
/// schema accumulated so far; [`SchemaAccumulator::finish`] emits the last one.
#[derive(Debug, Default)]
pub struct SchemaAccumulator {
    state: AccumulatorState,
    completed: Vec<PortableSchema>,
}

impl SchemaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the column `property` of the raw table `table_name`.
    pub fn push(&mut self, table_name: &str, property: PortableProperty) {
        let schema_id = quote_identifier(table_name);

        self.state = match std::mem::take(&mut self.state) {
            AccumulatorState::AccumulatingColumns(mut schema) if schema.id == schema_id => {
                schema.properties.push(property);
                AccumulatorState::AccumulatingColumns(schema)
            }
            previous => {
                if let AccumulatorState::AccumulatingColumns(schema) = previous {
                    self.completed.push(schema);
                }

                let mut schema = PortableSchema::for_table(table_name);
                schema.properties.push(property);
                AccumulatorState::AccumulatingColumns(schema)
            }
        };
    }

    /// Emits every accumulated schema in catalog order.
    pub fn finish(mut self) -> Vec<PortableSchema> {
        if let AccumulatorState::AccumulatingColumns(schema) = self.state {
            self.completed.push(schema);
        }

        self.completed
    }
}

/// Flags primary key columns on already discovered schemas.
///
/// `keys` holds `(table name, column name)` pairs. Pairs naming an unknown table or column
/// are ignored, and flags are only ever set, never cleared.
pub fn merge_primary_keys<'a, I>(schemas: &mut [PortableSchema], keys: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let positions: HashMap<String, usize> = schemas
        .iter()
        .enumerate()
        .map(|(position, schema)| (schema.id.clone(), position))
        .collect();

    for (table_name, column_name) in keys {
        let Some(&position) = positions.get(&quote_identifier(table_name)) else {
            continue;
        };

        let column_name = column_name.trim();
        if let Some(property) = schemas[position]
            .properties
            .iter_mut()
            .find(|property| property.name == column_name)
        {
            property.is_key = true;
        }
    }
}

/// Collapses properties sharing an id.
///
/// The later row's fields replace the earlier ones at the earlier row's position, and the
/// key flag is the OR of all rows.
pub fn dedupe_properties(properties: Vec<PortableProperty>) -> Vec<PortableProperty> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<PortableProperty> = Vec::with_capacity(properties.len());

    for property in properties {
        match positions.get(&property.id) {
            Some(&position) => {
                let was_key = deduped[position].is_key;
                deduped[position] = property;
                deduped[position].is_key |= was_key;
            }
            None => {
                positions.insert(property.id.clone(), deduped.len());
                deduped.push(property);
            }
        }
    }

    deduped
}

#[cfg(test)]
mod tests {
    use firebird::types::PropertyType;

    use super::*;

    fn column(name: &str) -> PortableProperty {
        PortableProperty::new(name, PropertyType::String, "VARCHAR(10)")
    }

    #[test]
    fn groups_consecutive_rows_by_table() {
        let mut accumulator = SchemaAccumulator::new();
        accumulator.push("A", column("X"));
        accumulator.push("A", column("Y"));
        accumulator.push("B", column("Z"));

        let schemas = accumulator.finish();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].id, "\"A\"");
        assert_eq!(schemas[0].properties.len(), 2);
        assert_eq!(schemas[1].name, "B");
    }

    #[test]
    fn empty_input_yields_no_schemas() {
        assert!(SchemaAccumulator::new().finish().is_empty());
    }

    #[test]
    fn key_merge_never_adds_tables_or_clears_flags() {
        let mut accumulator = SchemaAccumulator::new();
        accumulator.push("A", column("X").with_key(true));
        accumulator.push("A", column("Y"));
        let mut schemas = accumulator.finish();

        merge_primary_keys(
            &mut schemas,
            [("A", "Y "), ("MISSING", "X"), ("A", "NOPE")],
        );

        assert_eq!(schemas.len(), 1);
        assert!(schemas[0].properties.iter().all(|property| property.is_key));
    }

    #[test]
    fn dedupe_keeps_later_fields_and_ors_key() {
        let first = column("X").with_key(true).with_nullable(false);
        let mut second = column("X").with_nullable(true);
        second.type_at_source = "VARCHAR(20)".to_string();

        let deduped = dedupe_properties(vec![first, column("Y"), second]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "\"X\"");
        assert!(deduped[0].is_key);
        assert!(deduped[0].is_nullable);
        assert_eq!(deduped[0].type_at_source, "VARCHAR(20)");
        assert_eq!(deduped[1].id, "\"Y\"");
    }
}
