//! Reading records from tables and ad hoc queries.

use firebird::executor::{Connection, ConnectionFactory, Row, RowCursor, Statement};
use firebird::identifier::{DecomposedName, decompose_safe_id, quote_identifier};
use futures::{Stream, stream};
use tracing::debug;

use crate::bail;
use crate::connection::{ConnectionGuard, close_connection, connect_for, fetch_count};
use crate::conversions::cell_to_json;
use crate::error::{ConnectorResult, ErrorKind};
use crate::schema::{PortableSchema, RecordMap};

/// Statement selecting every row of `schema`: its query text, or the whole table.
pub fn select_statement(schema: &PortableSchema) -> ConnectorResult<Statement> {
    if schema.has_query() {
        return Ok(Statement::new(schema.query.trim()));
    }

    let name = table_name(schema)?;
    Ok(Statement::new(format!(
        "SELECT * FROM {}",
        quote_identifier(&name.table)
    )))
}

/// Statement counting the rows [`select_statement`] returns.
pub fn count_statement(schema: &PortableSchema) -> ConnectorResult<Statement> {
    if schema.has_query() {
        return Ok(Statement::new(format!(
            "SELECT COUNT(*) AS C FROM ({}) AS Q",
            schema.query.trim()
        )));
    }

    let name = table_name(schema)?;
    Ok(Statement::new(format!(
        "SELECT COUNT(*) AS C FROM {}",
        quote_identifier(&name.table)
    )))
}

fn table_name(schema: &PortableSchema) -> ConnectorResult<DecomposedName> {
    let name = decompose_safe_id(&schema.id);
    if name.table.trim().is_empty() {
        bail!(
            ErrorKind::InvalidSchemaId,
            "Schema id does not name a table",
            schema.id.clone()
        );
    }

    Ok(name)
}

/// Database the schema's rows live in. Query schemas run against the configured database.
fn source_name(schema: &PortableSchema) -> ConnectorResult<DecomposedName> {
    if schema.has_query() {
        Ok(DecomposedName::default())
    } else {
        table_name(schema)
    }
}

/// Converts a row into a record keyed by property id.
///
/// When the schema has properties only those are read, in property order; otherwise every
/// result column is keyed by its quoted name.
pub fn row_to_record(schema: &PortableSchema, row: &Row) -> RecordMap {
    let mut record = RecordMap::new();

    if schema.properties.is_empty() {
        for (column, value) in row.iter() {
            record.insert(quote_identifier(column), cell_to_json(value));
        }
        return record;
    }

    for property in &schema.properties {
        let value = row
            .get(&property.name)
            .or_else(|| row.get(&property.id))
            .map(cell_to_json)
            .unwrap_or_default();
        record.insert(property.id.clone(), value);
    }

    record
}

enum ReadState<C: Connection> {
    Pending,
    Open {
        // Declared before the guard so the cursor is released first.
        cursor: C::Cursor,
        connection: ConnectionGuard<C>,
        emitted: usize,
    },
    Done,
}

/// Streams the records of `schema`, at most `limit` of them when a limit is given.
///
/// Nothing is opened until the stream is first polled. The connection is closed once the
/// rows are exhausted, the limit is reached or an error ends the stream. Dropping the stream
/// before that closes it in the background.
pub fn read_records<'a, F>(
    factory: &'a F,
    schema: &'a PortableSchema,
    limit: Option<usize>,
) -> impl Stream<Item = ConnectorResult<RecordMap>> + Send + 'a
where
    F: ConnectionFactory,
{
    stream::try_unfold(ReadState::Pending, move |state| async move {
        let (mut cursor, connection, emitted) = match state {
            ReadState::Done => return Ok(None),
            ReadState::Pending => {
                if limit == Some(0) {
                    return Ok(None);
                }

                let statement = select_statement(schema)?;
                let mut connection = connect_for(factory, &source_name(schema)?).await?;
                debug!(schema_id = %schema.id, ?limit, "reading records");

                match connection.query(&statement).await {
                    Ok(cursor) => (cursor, ConnectionGuard::new(connection), 0),
                    Err(err) => return close_connection(connection, Err(err.into())).await,
                }
            }
            ReadState::Open {
                cursor,
                connection,
                emitted,
            } => (cursor, connection, emitted),
        };

        match cursor.next_row().await {
            Ok(Some(row)) => {
                let record = row_to_record(schema, &row);
                let emitted = emitted + 1;

                if limit.is_some_and(|limit| emitted >= limit) {
                    drop(cursor);
                    connection.close(Ok(())).await?;
                    return Ok(Some((record, ReadState::Done)));
                }

                Ok(Some((
                    record,
                    ReadState::Open {
                        cursor,
                        connection,
                        emitted,
                    },
                )))
            }
            Ok(None) => {
                drop(cursor);
                connection.close(Ok(None)).await
            }
            Err(err) => {
                drop(cursor);
                connection.close(Err(err.into())).await
            }
        }
    })
}

/// Counts the records of `schema` exactly.
pub async fn count_records<F>(factory: &F, schema: &PortableSchema) -> ConnectorResult<i64>
where
    F: ConnectionFactory,
{
    let statement = count_statement(schema)?;
    let mut connection = connect_for(factory, &source_name(schema)?).await?;
    let result = fetch_count(&mut connection, &statement).await;

    close_connection(connection, result).await
}
