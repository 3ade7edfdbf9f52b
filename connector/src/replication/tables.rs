use firebird::catalog;
use firebird::executor::{Connection, ConnectionFactory, Statement};
use firebird::identifier::quote_identifier;
use firebird::types::Cell;
use tracing::{debug, info};

use crate::connection::{close_connection, fetch_count, fetch_first};
use crate::conversions::{cell_to_json, json_to_cell};
use crate::error::{ConnectorError, ConnectorResult, ErrorKind};
use crate::replication::{
    ID_DDL, REPLICATION_RECORD_ID, REPLICATION_VERSION_IDS, REPLICATION_VERSION_RECORD_ID,
    ReplicationColumn, ReplicationTable, TEXT_DDL,
};
use crate::schema::{PortableSchema, RecordMap};
use crate::{bail, connector_error};

/// Columns for every property of `schema`, none of them keyed.
pub fn table_from_schema(schema: &PortableSchema, table_name: &str) -> ReplicationTable {
    let columns = schema
        .properties
        .iter()
        .map(|property| ReplicationColumn::new(property.name.clone(), property.ddl_type()))
        .collect();

    ReplicationTable {
        table_name: table_name.to_string(),
        columns,
    }
}

/// Golden table: the schema's columns, the record id key and the serialized version ids.
pub fn golden_table(schema: &PortableSchema, table_name: &str) -> ReplicationTable {
    let mut table = table_from_schema(schema, table_name);
    table
        .columns
        .push(ReplicationColumn::new(REPLICATION_RECORD_ID, ID_DDL).with_primary_key());
    table
        .columns
        .push(ReplicationColumn::new(REPLICATION_VERSION_IDS, TEXT_DDL).with_serialize());
    table
}

/// Version table: the schema's columns, the version id key and the owning record id.
pub fn version_table(schema: &PortableSchema, table_name: &str) -> ReplicationTable {
    let mut table = table_from_schema(schema, table_name);
    table
        .columns
        .push(ReplicationColumn::new(REPLICATION_VERSION_RECORD_ID, ID_DDL).with_primary_key());
    table
        .columns
        .push(ReplicationColumn::new(REPLICATION_RECORD_ID, ID_DDL));
    table
}

/// `CREATE TABLE` for `table` with a composite key constraint over its key columns.
pub fn create_table_sql(table: &ReplicationTable) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            format!(
                "{} {}{}",
                quote_identifier(&column.column_name),
                column.data_type,
                if column.primary_key { " NOT NULL" } else { "" }
            )
        })
        .collect();

    let keys: Vec<String> = table
        .columns
        .iter()
        .filter(|column| column.primary_key)
        .map(|column| quote_identifier(&column.column_name))
        .collect();
    if !keys.is_empty() {
        lines.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote_identifier(&format!("{}_PK", table.table_name.trim())),
            keys.join(",")
        ));
    }

    format!(
        "CREATE TABLE {} (\n{})",
        quote_identifier(&table.table_name),
        lines.join(",\n")
    )
}

async fn table_exists<C>(connection: &mut C, table: &ReplicationTable) -> ConnectorResult<bool>
where
    C: Connection,
{
    let statement =
        Statement::new(catalog::TABLE_EXISTS_QUERY).bind(table.table_name.trim());
    Ok(fetch_count(connection, &statement).await? > 0)
}

/// Creates `table` unless a relation with its name exists.
pub async fn ensure_table<F>(factory: &F, table: &ReplicationTable) -> ConnectorResult<()>
where
    F: ConnectionFactory,
{
    let mut connection = factory.connect(None).await?;
    let result = async {
        info!(table = %table.table_name, "checking for table");
        if table_exists(&mut connection, table).await? {
            return Ok(());
        }

        let sql = create_table_sql(table);
        info!(table = %table.table_name, %sql, "creating table");
        connection.execute(&Statement::new(sql)).await?;

        Ok::<_, ConnectorError>(())
    }
    .await;

    close_connection(connection, result).await
}

/// Drops `table` when it exists.
pub async fn drop_table<F>(factory: &F, table: &ReplicationTable) -> ConnectorResult<()>
where
    F: ConnectionFactory,
{
    let mut connection = factory.connect(None).await?;
    let result = async {
        if !table_exists(&mut connection, table).await? {
            debug!(table = %table.table_name, "table to drop does not exist");
            return Ok(());
        }

        info!(table = %table.table_name, "dropping table");
        let sql = format!("DROP TABLE {}", quote_identifier(&table.table_name));
        connection.execute(&Statement::new(sql)).await?;

        Ok::<_, ConnectorError>(())
    }
    .await;

    close_connection(connection, result).await
}

fn key_column_name(table: &ReplicationTable) -> ConnectorResult<String> {
    match table.key_column() {
        Some(column) => Ok(quote_identifier(&column.column_name)),
        None => bail!(
            ErrorKind::InvalidState,
            "Replication table has no key column",
            table.table_name
        ),
    }
}

/// Returns whether a row with key `key` exists in `table`.
pub async fn record_exists<F>(
    factory: &F,
    table: &ReplicationTable,
    key: &str,
) -> ConnectorResult<bool>
where
    F: ConnectionFactory,
{
    let statement = Statement::new(format!(
        "SELECT COUNT(*) AS C FROM {} WHERE {} = ?",
        quote_identifier(&table.table_name),
        key_column_name(table)?
    ))
    .bind(key);

    let mut connection = factory.connect(None).await?;
    let result = fetch_count(&mut connection, &statement).await;
    let count = close_connection(connection, result).await?;

    Ok(count > 0)
}

/// Loads the row with key `key`, keyed by column name.
pub async fn get_record<F>(
    factory: &F,
    table: &ReplicationTable,
    key: &str,
) -> ConnectorResult<Option<RecordMap>>
where
    F: ConnectionFactory,
{
    let statement = Statement::new(format!(
        "SELECT * FROM {} WHERE {} = ?",
        quote_identifier(&table.table_name),
        key_column_name(table)?
    ))
    .bind(key);

    let mut connection = factory.connect(None).await?;
    let result = fetch_first(&mut connection, &statement).await;
    let row = close_connection(connection, result).await?;

    Ok(row.map(|row| {
        row.iter()
            .map(|(column, value)| (column.trim().to_string(), cell_to_json(value)))
            .collect()
    }))
}

/// Deletes the row with key `key`. Deleting a missing row is not an error.
pub async fn delete_record<F>(
    factory: &F,
    table: &ReplicationTable,
    key: &str,
) -> ConnectorResult<()>
where
    F: ConnectionFactory,
{
    let statement = Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_identifier(&table.table_name),
        key_column_name(table)?
    ))
    .bind(key);

    let mut connection = factory.connect(None).await?;
    let result = connection
        .execute(&statement)
        .await
        .map(|_| ())
        .map_err(ConnectorError::from);

    close_connection(connection, result).await
}

/// Inserts `data` or overwrites the row with the same key.
///
/// Keys of `data` that are not columns of `table` are ignored. Values of serialized columns
/// are stored as their JSON text.
pub async fn upsert_record<F>(
    factory: &F,
    table: &ReplicationTable,
    data: &RecordMap,
) -> ConnectorResult<()>
where
    F: ConnectionFactory,
{
    let key_column = key_column_name(table)?;

    let mut columns = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for column in &table.columns {
        let Some(value) = data.get(column.column_name.as_ref()) else {
            continue;
        };

        let cell = if column.serialize {
            Cell::String(serde_json::to_string(value)?)
        } else {
            json_to_cell(value)
        };
        columns.push(quote_identifier(&column.column_name));
        params.push(cell);
    }

    if !columns.contains(&key_column) {
        return Err(connector_error!(
            ErrorKind::InvalidData,
            "Record is missing its key value",
            format!("{} in {}", key_column, table.table_name)
        ));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let statement = Statement::with_params(
        format!(
            "UPDATE OR INSERT INTO {} ({}) VALUES ({}) MATCHING ({})",
            quote_identifier(&table.table_name),
            columns.join(", "),
            placeholders,
            key_column
        ),
        params,
    );

    let mut connection = factory.connect(None).await?;
    let result = connection
        .execute(&statement)
        .await
        .map(|_| ())
        .map_err(ConnectorError::from);

    close_connection(connection, result).await
}

#[cfg(test)]
mod tests {
    use firebird::types::PropertyType;

    use super::*;
    use crate::schema::PortableProperty;

    fn schema() -> PortableSchema {
        let mut schema = PortableSchema::for_table("PERSONS");
        schema.properties = vec![
            PortableProperty::new("PERSONID", PropertyType::Integer, "INTEGER").with_key(true),
            PortableProperty::new("NOTES", PropertyType::Text, ""),
        ];
        schema
    }

    #[test]
    fn golden_table_appends_record_columns() {
        let table = golden_table(&schema(), "GOLDEN");
        let names: Vec<&str> = table.columns.iter().map(|c| c.column_name.as_ref()).collect();

        assert_eq!(
            names,
            vec!["PERSONID", "NOTES", REPLICATION_RECORD_ID, REPLICATION_VERSION_IDS]
        );
        assert!(!table.columns[0].primary_key);
        assert_eq!(table.columns[1].data_type, "BLOB SUB_TYPE 1");
        assert_eq!(table.key_column().unwrap().column_name, REPLICATION_RECORD_ID);
        assert!(table.columns[3].serialize);
    }

    #[test]
    fn version_table_keys_on_version_id() {
        let table = version_table(&schema(), "VERSIONS");

        assert_eq!(
            table.key_column().unwrap().column_name,
            REPLICATION_VERSION_RECORD_ID
        );
        assert_eq!(table.columns.last().unwrap().column_name, REPLICATION_RECORD_ID);
    }

    #[test]
    fn create_sql_declares_composite_key() {
        let table = ReplicationTable {
            table_name: "T".to_string(),
            columns: vec![
                ReplicationColumn::new("A", "VARCHAR(255)").with_primary_key(),
                ReplicationColumn::new("B", "INTEGER"),
                ReplicationColumn::new("C", "VARCHAR(255)").with_primary_key(),
            ],
        };

        assert_eq!(
            create_table_sql(&table),
            "CREATE TABLE \"T\" (\n\"A\" VARCHAR(255) NOT NULL,\n\"B\" INTEGER,\n\"C\" VARCHAR(255) NOT NULL,\nCONSTRAINT \"T_PK\" PRIMARY KEY (\"A\",\"C\"))"
        );
    }

    #[test]
    fn create_sql_without_keys_has_no_constraint() {
        let table = ReplicationTable {
            table_name: "T".to_string(),
            columns: vec![ReplicationColumn::new("B", "INTEGER")],
        };

        assert_eq!(create_table_sql(&table), "CREATE TABLE \"T\" (\n\"B\" INTEGER)");
    }
}
