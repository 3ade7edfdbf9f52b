//! Abstract query execution against a Firebird server.
//!
//! The connector never links a wire driver directly. A driver integration implements
//! [`ConnectionFactory`], [`Connection`] and [`RowCursor`], and every catalog or data access
//! in the connector goes through these traits.

use std::future::Future;
use std::sync::Arc;

use crate::error::DriverError;
use crate::types::Cell;

/// A SQL statement with positional `?` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Cell>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Cell>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Appends a parameter bound to the next `?` placeholder.
    pub fn bind(mut self, value: impl Into<Cell>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// A row returned by a [`RowCursor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Cell>,
}

impl Row {
    /// Creates a row. `columns` and `values` are positionally aligned.
    pub fn new(columns: Arc<[String]>, values: Vec<Cell>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Looks up a value by column name.
    ///
    /// An exact match wins; otherwise names are compared case-insensitively with surrounding
    /// quotes and padding removed, since Firebird reports unquoted aliases in upper case.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        if let Some(index) = self.columns.iter().position(|name| name == column) {
            return self.values.get(index);
        }

        let wanted = normalize_column(column);
        self.columns
            .iter()
            .position(|name| normalize_column(name) == wanted)
            .and_then(|index| self.values.get(index))
    }

    /// Looks up a column and renders it as trimmed text. Null and missing columns are `None`.
    pub fn get_string(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Cell::to_trimmed_string)
    }

    /// Looks up an integer column.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Cell::as_i64)
    }

    /// Iterates over `(column, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

fn normalize_column(name: &str) -> String {
    name.trim().trim_matches('"').trim().to_uppercase()
}

/// Opens connections to a Firebird server.
pub trait ConnectionFactory: Send + Sync {
    type Connection: Connection;

    /// Opens a connection to the configured database, or to `database` on the same server.
    fn connect(
        &self,
        database: Option<&str>,
    ) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send;
}

impl<F: ConnectionFactory> ConnectionFactory for Arc<F> {
    type Connection = F::Connection;

    fn connect(
        &self,
        database: Option<&str>,
    ) -> impl Future<Output = Result<Self::Connection, DriverError>> + Send {
        F::connect(self, database)
    }
}

/// An open connection.
///
/// Connections are not shared between tasks; every operation opens its own and must call
/// [`Connection::close`] on every exit path. Connections own their resources so a dropped
/// one can still be closed from a background task.
pub trait Connection: Send + Sized + 'static {
    type Cursor: RowCursor;

    /// Runs a statement that returns rows.
    fn query(
        &mut self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Self::Cursor, DriverError>> + Send;

    /// Runs a statement that does not return rows and reports the affected row count.
    fn execute(
        &mut self,
        statement: &Statement,
    ) -> impl Future<Output = Result<u64, DriverError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), DriverError>> + Send;
}

/// Forward-only cursor over a query result.
pub trait RowCursor: Send {
    fn next_row(&mut self) -> impl Future<Output = Result<Option<Row>, DriverError>> + Send;
}
