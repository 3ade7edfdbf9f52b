//! Helpers shared by every operation that opens a connection.

use firebird::executor::{Connection, ConnectionFactory, Row, RowCursor, Statement};
use firebird::identifier::DecomposedName;
use tracing::{debug, warn};

use crate::error::ConnectorResult;

/// Opens a connection, targeting the decomposed database when one is named.
pub async fn connect_for<F>(factory: &F, name: &DecomposedName) -> ConnectorResult<F::Connection>
where
    F: ConnectionFactory,
{
    let database = (!name.database.trim().is_empty()).then_some(name.database.as_str());
    Ok(factory.connect(database).await?)
}

/// Closes `connection` and passes `result` through.
///
/// A close failure after a failed body is only logged so the original error reaches the
/// caller. After a successful body the close failure is returned.
pub async fn close_connection<C, T>(connection: C, result: ConnectorResult<T>) -> ConnectorResult<T>
where
    C: Connection,
{
    match (connection.close().await, result) {
        (Ok(()), result) => result,
        (Err(close_err), Ok(_)) => Err(close_err.into()),
        (Err(close_err), Err(err)) => {
            warn!(error = %close_err, "failed to close connection after error");
            Err(err)
        }
    }
}

/// Holds a connection that outlives a single call, such as the one behind a read stream.
///
/// [`ConnectionGuard::close`] closes it in place. A guard dropped while still holding its
/// connection hands the close to a background task on the current tokio runtime.
#[derive(Debug)]
pub struct ConnectionGuard<C: Connection> {
    connection: Option<C>,
}

impl<C: Connection> ConnectionGuard<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Closes the connection and passes `result` through, like [`close_connection`].
    pub async fn close<T>(mut self, result: ConnectorResult<T>) -> ConnectorResult<T> {
        match self.connection.take() {
            Some(connection) => close_connection(connection, result).await,
            None => result,
        }
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("closing abandoned connection in the background");
                handle.spawn(async move {
                    if let Err(err) = connection.close().await {
                        warn!(error = %err, "failed to close abandoned connection");
                    }
                });
            }
            Err(_) => warn!("connection dropped outside a tokio runtime, it was not closed"),
        }
    }
}

/// Runs `statement` and collects every row.
pub async fn fetch_all<C>(connection: &mut C, statement: &Statement) -> ConnectorResult<Vec<Row>>
where
    C: Connection,
{
    let mut cursor = connection.query(statement).await?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row().await? {
        rows.push(row);
    }

    Ok(rows)
}

/// Runs `statement` and returns its first row.
pub async fn fetch_first<C>(
    connection: &mut C,
    statement: &Statement,
) -> ConnectorResult<Option<Row>>
where
    C: Connection,
{
    let mut cursor = connection.query(statement).await?;
    Ok(cursor.next_row().await?)
}

/// Runs a `COUNT(*)` statement and reads the count from its first column.
pub async fn fetch_count<C>(connection: &mut C, statement: &Statement) -> ConnectorResult<i64>
where
    C: Connection,
{
    let count = fetch_first(connection, statement)
        .await?
        .and_then(|row| row.values().first().and_then(|value| value.as_i64()))
        .unwrap_or(0);

    Ok(count)
}
