//! Schema discovery from the Firebird catalog.
//!
//! Discovery runs in two passes: column rows are grouped into schemas, then primary key
//! rows flag key columns. Every returned schema carries a bounded sample and an exact count.

mod accumulator;

pub use accumulator::{SchemaAccumulator, dedupe_properties, merge_primary_keys};

use firebird::catalog;
use firebird::executor::{ConnectionFactory, Row, Statement};
use firebird::identifier::decompose_safe_id;
use firebird::types::{map_portable_type, map_source_ddl_type, native};
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::bail;
use crate::connection::{close_connection, connect_for, fetch_all};
use crate::error::{ConnectorError, ConnectorResult, ErrorKind};
use crate::read::{count_records, read_records};
use crate::schema::{PortableProperty, PortableSchema};

/// Number of sample rows attached to each schema when the host does not ask for another.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Builds a property from a catalog column row, returning it with its raw table name.
///
/// Rows without a table or column name are skipped.
pub fn property_from_row(row: &Row) -> Option<(String, PortableProperty)> {
    let table_name = row.get_string(catalog::TABLE_NAME)?;
    let column_name = row.get_string(catalog::COLUMN_NAME)?;
    let data_type = row
        .get_string(catalog::DATA_TYPE)
        .unwrap_or_else(|| native::OTHER.to_string());
    let length = row.get_i64(catalog::CHARACTER_MAXIMUM_LENGTH);
    let precision = row.get_i64(catalog::DATA_PRECISION);
    let scale = row.get_i64(catalog::DATA_SCALE);

    let is_flag_set =
        |column: &str| row.get_string(column).as_deref() == Some(catalog::FLAG_YES);

    let property = PortableProperty::new(
        &column_name,
        map_portable_type(&data_type, length),
        map_source_ddl_type(&data_type, length, precision, scale),
    )
    .with_nullable(is_flag_set(catalog::IS_NULLABLE))
    .with_key(is_flag_set(catalog::COLUMN_KEY));

    Some((table_name, property))
}

fn properties_from_rows(rows: &[Row]) -> Vec<PortableProperty> {
    rows.iter()
        .filter_map(property_from_row)
        .map(|(_, property)| property)
        .collect()
}

fn key_columns(rows: &[Row]) -> Vec<(String, String)> {
    rows.iter()
        .filter_map(|row| {
            Some((
                row.get_string(catalog::TABLE_NAME)?,
                row.get_string(catalog::PK_FIELD_NAME)?,
            ))
        })
        .collect()
}

fn merge_key_rows(schemas: &mut [PortableSchema], rows: &[Row]) {
    let keys = key_columns(rows);
    merge_primary_keys(
        schemas,
        keys.iter()
            .map(|(table, column)| (table.as_str(), column.as_str())),
    );
}

/// Attaches at most `sample_size` rows and the exact row count to `schema`.
pub async fn attach_sample_and_count<F>(
    factory: &F,
    mut schema: PortableSchema,
    sample_size: usize,
) -> ConnectorResult<PortableSchema>
where
    F: ConnectionFactory,
{
    schema.sample = read_records(factory, &schema, Some(sample_size))
        .try_collect()
        .await?;
    schema.count = count_records(factory, &schema).await?;

    Ok(schema)
}

/// Discovers every user table.
pub async fn discover_all<F>(
    factory: &F,
    sample_size: usize,
) -> ConnectorResult<Vec<PortableSchema>>
where
    F: ConnectionFactory,
{
    let mut connection = factory.connect(None).await?;
    let result = async {
        let column_rows =
            fetch_all(&mut connection, &Statement::new(catalog::ALL_COLUMNS_QUERY)).await?;
        let key_rows =
            fetch_all(&mut connection, &Statement::new(catalog::ALL_PRIMARY_KEYS_QUERY)).await?;
        Ok::<_, ConnectorError>((column_rows, key_rows))
    }
    .await;
    let (column_rows, key_rows) = close_connection(connection, result).await?;

    let mut accumulator = SchemaAccumulator::new();
    for (table_name, property) in column_rows.iter().filter_map(property_from_row) {
        accumulator.push(&table_name, property);
    }
    let mut schemas = accumulator.finish();
    merge_key_rows(&mut schemas, &key_rows);

    info!(schemas = schemas.len(), "discovered table schemas");

    let mut discovered = Vec::with_capacity(schemas.len());
    for schema in schemas {
        discovered.push(attach_sample_and_count(factory, schema, sample_size).await?);
    }

    Ok(discovered)
}

/// Re-reads the columns and keys of the table named by `schema`'s id.
///
/// Identity fields are kept; properties, sample and count are replaced.
pub async fn refresh_schema<F>(
    factory: &F,
    mut schema: PortableSchema,
    sample_size: usize,
) -> ConnectorResult<PortableSchema>
where
    F: ConnectionFactory,
{
    let name = decompose_safe_id(&schema.id);
    if name.table.trim().is_empty() {
        bail!(
            ErrorKind::InvalidSchemaId,
            "Schema id does not name a table",
            schema.id
        );
    }

    let mut connection = connect_for(factory, &name).await?;
    let result = async {
        let column_rows = fetch_all(
            &mut connection,
            &Statement::new(catalog::TABLE_COLUMNS_QUERY).bind(name.table.as_str()),
        )
        .await?;
        let key_rows = fetch_all(
            &mut connection,
            &Statement::new(catalog::TABLE_PRIMARY_KEYS_QUERY).bind(name.table.as_str()),
        )
        .await?;
        Ok::<_, ConnectorError>((column_rows, key_rows))
    }
    .await;
    let (column_rows, key_rows) = close_connection(connection, result).await?;

    let mut refreshed = PortableSchema::for_table(&name.table);
    refreshed.properties = properties_from_rows(&column_rows);
    merge_key_rows(std::slice::from_mut(&mut refreshed), &key_rows);

    debug!(schema_id = %schema.id, properties = refreshed.properties.len(), "refreshed schema");

    schema.properties = refreshed.properties;
    schema.sample.clear();
    schema.count = 0;

    attach_sample_and_count(factory, schema, sample_size).await
}

/// Resolves the properties of a query backed schema from the table named by its id.
///
/// Key flags come inline with the column rows; a column listed in several index segments
/// appears once per segment and is collapsed with [`dedupe_properties`].
pub async fn resolve_schema_for_query<F>(
    factory: &F,
    mut schema: PortableSchema,
    sample_size: usize,
) -> ConnectorResult<PortableSchema>
where
    F: ConnectionFactory,
{
    let name = decompose_safe_id(&schema.id);
    if name.table.trim().is_empty() {
        bail!(
            ErrorKind::InvalidSchemaId,
            "Schema id does not name a table",
            schema.id
        );
    }

    let mut connection = connect_for(factory, &name).await?;
    let result = fetch_all(
        &mut connection,
        &Statement::new(catalog::TABLE_COLUMNS_WITH_KEYS_QUERY).bind(name.table.as_str()),
    )
    .await;
    let rows = close_connection(connection, result).await?;

    schema.properties = dedupe_properties(properties_from_rows(&rows));
    schema.sample.clear();
    schema.count = 0;

    debug!(schema_id = %schema.id, properties = schema.properties.len(), "resolved query schema");

    attach_sample_and_count(factory, schema, sample_size).await
}

/// Refreshes `schemas`, resolving query backed ones and re-reading table ones.
pub async fn refresh_schemas<F>(
    factory: &F,
    schemas: Vec<PortableSchema>,
    sample_size: usize,
) -> ConnectorResult<Vec<PortableSchema>>
where
    F: ConnectionFactory,
{
    let mut refreshed = Vec::with_capacity(schemas.len());
    for schema in schemas {
        let schema = if schema.has_query() {
            resolve_schema_for_query(factory, schema, sample_size).await?
        } else {
            refresh_schema(factory, schema, sample_size).await?
        };
        refreshed.push(schema);
    }

    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use firebird::types::{Cell, PropertyType};

    use super::*;

    fn catalog_row(values: Vec<(&str, Cell)>) -> Row {
        let (columns, values): (Vec<String>, Vec<Cell>) = values
            .into_iter()
            .map(|(column, value)| (column.to_string(), value))
            .unzip();
        Row::new(Arc::from(columns), values)
    }

    #[test]
    fn maps_catalog_row_to_property() {
        let row = catalog_row(vec![
            ("TABLE_NAME", Cell::from("PERSONS      ")),
            ("COLUMN_NAME", Cell::from("LASTNAME    ")),
            ("DATA_TYPE", Cell::from("VARCHAR         ")),
            ("IS_NULLABLE", Cell::from("YES")),
            ("CHARACTER_MAXIMUM_LENGTH", Cell::I16(255)),
            ("DATA_PRECISION", Cell::Null),
            ("DATA_SCALE", Cell::Null),
        ]);

        let (table, property) = property_from_row(&row).unwrap();

        assert_eq!(table, "PERSONS");
        assert_eq!(property.id, "\"LASTNAME\"");
        assert_eq!(property.property_type, PropertyType::String);
        assert_eq!(property.type_at_source, "VARCHAR(255)");
        assert!(property.is_nullable);
        assert!(!property.is_key);
    }

    #[test]
    fn inline_key_flag_is_read() {
        let row = catalog_row(vec![
            ("TABLE_NAME", Cell::from("PERSONS")),
            ("COLUMN_NAME", Cell::from("PERSONID")),
            ("DATA_TYPE", Cell::from("NUMERIC")),
            ("COLUMN_KEY", Cell::from("YES")),
            ("IS_NULLABLE", Cell::from("NO")),
            ("DATA_PRECISION", Cell::I16(18)),
            ("DATA_SCALE", Cell::I16(2)),
        ]);

        let (_, property) = property_from_row(&row).unwrap();

        assert!(property.is_key);
        assert!(!property.is_nullable);
        assert_eq!(property.property_type, PropertyType::Decimal);
        assert_eq!(property.type_at_source, "NUMERIC(18,2)");
    }

    #[test]
    fn rows_without_names_are_skipped() {
        let row = catalog_row(vec![("TABLE_NAME", Cell::from("PERSONS")), ("COLUMN_NAME", Cell::Null)]);
        assert!(property_from_row(&row).is_none());
    }
}
