use std::collections::BTreeMap;
use std::sync::Arc;

use firebird::catalog;
use firebird::error::gds;
use firebird::executor::{Connection, ConnectionFactory, Row, RowCursor, Statement};
use firebird::types::{Cell, native};
use firebird::DriverError;
use tokio::sync::Mutex;

/// Width catalog `CHAR` columns are padded to.
const CATALOG_NAME_WIDTH: usize = 31;

/// A column of an in-memory table or a procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryColumn {
    pub name: String,
    /// Native type name as the catalog reports it.
    pub native_type: String,
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    pub primary_key: bool,
    /// Additional index segments the column appears in, each adding a catalog row to the
    /// inline key query.
    pub extra_segments: usize,
}

impl MemoryColumn {
    pub fn new(name: &str, native_type: &str) -> Self {
        Self {
            name: name.to_string(),
            native_type: native_type.to_string(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            primary_key: false,
            extra_segments: 0,
        }
    }

    pub fn varchar(name: &str, length: i64) -> Self {
        Self::new(name, native::VARCHAR).with_length(length)
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: i64, scale: i64) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn with_extra_segments(mut self, extra_segments: usize) -> Self {
        self.extra_segments = extra_segments;
        self
    }

    /// Reads back a column declared by a `CREATE TABLE` line.
    fn from_ddl(name: &str, ddl: &str) -> Self {
        let ddl = ddl.trim().to_uppercase();

        match ddl.as_str() {
            "BLOB SUB_TYPE 1" => return Self::new(name, native::TEXT),
            "TIME WITH TIME ZONE" => return Self::new(name, native::TIME_TZ),
            "TIMESTAMP WITH TIME ZONE" => return Self::new(name, native::TIMESTAMP_TZ),
            _ => {}
        }

        let Some((type_name, dimensions)) = ddl.split_once('(') else {
            return Self::new(name, &ddl);
        };
        let dimensions: Vec<i64> = dimensions
            .trim_end_matches(')')
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();

        let column = Self::new(name, type_name.trim());
        match (type_name.trim(), dimensions.as_slice()) {
            (native::CHAR | native::VARCHAR, [length]) => column.with_length(*length),
            (_, [precision]) => column.with_precision(*precision, 0),
            (_, [precision, scale]) => column.with_precision(*precision, *scale),
            _ => column,
        }
    }
}

/// An in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    pub name: String,
    pub columns: Vec<MemoryColumn>,
    /// Rows with one cell per column.
    pub rows: Vec<Vec<Cell>>,
}

impl MemoryTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, column: MemoryColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row(mut self, row: Vec<Cell>) -> Self {
        self.rows.push(row);
        self
    }

    fn column_index(&self, name: &str) -> Result<usize, DriverError> {
        self.columns
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| {
                DriverError::query(format!("Column unknown\n{name}"))
                    .with_gds_code(gds::COLUMN_UNKNOWN)
            })
    }

    fn column_names(&self) -> Arc<[String]> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    fn to_row(&self, values: &[Cell]) -> Row {
        Row::new(self.column_names(), values.to_vec())
    }

    /// Returns the row whose `column` holds `key`.
    pub fn find_row(&self, column: &str, key: &str) -> Option<Row> {
        let index = self.column_index(column).ok()?;
        self.rows
            .iter()
            .find(|row| row[index].to_trimmed_string().as_deref() == Some(key))
            .map(|row| self.to_row(row))
    }
}

/// An in-memory stored procedure that records its calls.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryProcedure {
    pub name: String,
    pub id: i64,
    pub parameters: Vec<MemoryColumn>,
    pub calls: Vec<Vec<Cell>>,
}

impl MemoryProcedure {
    pub fn new(name: &str, id: i64) -> Self {
        Self {
            name: name.to_string(),
            id,
            parameters: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn parameter(mut self, parameter: MemoryColumn) -> Self {
        self.parameters.push(parameter);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, MemoryTable>,
    procedures: BTreeMap<String, MemoryProcedure>,
    executed: Vec<String>,
    databases: Vec<Option<String>>,
    open_connections: usize,
    statement_failures: Vec<(String, DriverError)>,
    connect_failure: Option<DriverError>,
}

/// In-memory Firebird database for tests.
///
/// Answers the catalog queries the connector issues and interprets the statement shapes it
/// builds for reads and replication writes. Every statement is logged so tests can assert on
/// the SQL that ran. Clones share the same database.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_table(&self, table: MemoryTable) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(table.name.clone(), table);
    }

    pub async fn add_procedure(&self, procedure: MemoryProcedure) {
        let mut inner = self.inner.lock().await;
        inner.procedures.insert(procedure.name.clone(), procedure);
    }

    pub async fn has_table(&self, name: &str) -> bool {
        self.inner.lock().await.tables.contains_key(name)
    }

    pub async fn table(&self, name: &str) -> Option<MemoryTable> {
        self.inner.lock().await.tables.get(name).cloned()
    }

    pub async fn row_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .await
            .tables
            .get(name)
            .map_or(0, |table| table.rows.len())
    }

    pub async fn find_row(&self, table: &str, column: &str, key: &str) -> Option<Row> {
        let inner = self.inner.lock().await;
        inner.tables.get(table)?.find_row(column, key)
    }

    pub async fn procedure_calls(&self, name: &str) -> Vec<Vec<Cell>> {
        self.inner
            .lock()
            .await
            .procedures
            .get(name)
            .map(|procedure| procedure.calls.clone())
            .unwrap_or_default()
    }

    /// SQL of every statement run so far, in order.
    pub async fn executed_sql(&self) -> Vec<String> {
        self.inner.lock().await.executed.clone()
    }

    pub async fn clear_executed(&self) {
        self.inner.lock().await.executed.clear();
    }

    /// Connections opened and not yet closed.
    pub async fn open_connections(&self) -> usize {
        self.inner.lock().await.open_connections
    }

    /// Database argument of every connect call, in order.
    pub async fn connected_databases(&self) -> Vec<Option<String>> {
        self.inner.lock().await.databases.clone()
    }

    /// Fails every statement whose SQL contains `fragment` with `error`.
    pub async fn fail_statements_containing(&self, fragment: &str, error: DriverError) {
        let mut inner = self.inner.lock().await;
        inner.statement_failures.push((fragment.to_string(), error));
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.statement_failures.clear();
        inner.connect_failure = None;
    }

    /// Fails every following connect call with `error`.
    pub async fn fail_connections(&self, error: DriverError) {
        self.inner.lock().await.connect_failure = Some(error);
    }
}

impl ConnectionFactory for MemoryDatabase {
    type Connection = MemoryConnection;

    async fn connect(&self, database: Option<&str>) -> Result<MemoryConnection, DriverError> {
        let mut inner = self.inner.lock().await;
        if let Some(error) = &inner.connect_failure {
            return Err(error.clone());
        }

        inner.databases.push(database.map(str::to_string));
        inner.open_connections += 1;

        Ok(MemoryConnection {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    inner: Arc<Mutex<Inner>>,
}

impl Connection for MemoryConnection {
    type Cursor = MemoryCursor;

    async fn query(&mut self, statement: &Statement) -> Result<MemoryCursor, DriverError> {
        let mut inner = self.inner.lock().await;
        inner.record(statement)?;
        let rows = inner.query(statement)?;

        Ok(MemoryCursor {
            rows: rows.into_iter(),
        })
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, DriverError> {
        let mut inner = self.inner.lock().await;
        inner.record(statement)?;
        inner.execute(statement)
    }

    async fn close(self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().await;
        inner.open_connections = inner.open_connections.saturating_sub(1);
        Ok(())
    }
}

/// Cursor over a materialized result.
#[derive(Debug)]
pub struct MemoryCursor {
    rows: std::vec::IntoIter<Row>,
}

impl RowCursor for MemoryCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.next())
    }
}

fn unsupported(sql: &str) -> DriverError {
    DriverError::query(format!("Unsupported statement\n{sql}"))
}

fn table_unknown(name: &str) -> DriverError {
    DriverError::query(format!("Table unknown\n{name}")).with_gds_code(gds::TABLE_UNKNOWN)
}

fn unquote(name: &str) -> String {
    name.trim().trim_matches('"').to_string()
}

fn quoted_list(list: &str) -> Vec<String> {
    list.split(',').map(unquote).collect()
}

fn padded(name: &str) -> Cell {
    Cell::String(format!("{name:<width$}", width = CATALOG_NAME_WIDTH))
}

fn flag(value: bool) -> Cell {
    Cell::from(if value { "YES" } else { "NO" })
}

fn optional(value: Option<i64>) -> Cell {
    value.map_or(Cell::Null, Cell::I64)
}

fn keys_equal(value: &Cell, key: &Cell) -> bool {
    !value.is_null() && value.to_trimmed_string() == key.to_trimmed_string()
}

fn first_param(statement: &Statement) -> Result<&Cell, DriverError> {
    statement
        .params
        .first()
        .ok_or_else(|| DriverError::query("Missing parameter value"))
}

fn catalog_rows(columns: &[&str], rows: Vec<Vec<Cell>>) -> Vec<Row> {
    let columns: Arc<[String]> = columns.iter().map(|column| column.to_string()).collect();
    rows.into_iter()
        .map(|values| Row::new(Arc::clone(&columns), values))
        .collect()
}

/// Splits `"T" WHERE "K" = ?` into the table and the optional key column.
fn table_and_key(rest: &str) -> (String, Option<String>) {
    match rest.split_once(" WHERE ") {
        Some((table, condition)) => (
            unquote(table),
            Some(unquote(condition.trim().trim_end_matches('?').trim_end().trim_end_matches('='))),
        ),
        None => (unquote(rest), None),
    }
}

impl Inner {
    fn record(&mut self, statement: &Statement) -> Result<(), DriverError> {
        self.executed.push(statement.sql.clone());

        match self
            .statement_failures
            .iter()
            .find(|(fragment, _)| statement.sql.contains(fragment.as_str()))
        {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, DriverError> {
        self.tables.get(name).ok_or_else(|| table_unknown(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, DriverError> {
        self.tables.get_mut(name).ok_or_else(|| table_unknown(name))
    }

    fn column_rows(&self, table_filter: Option<&str>, inline_keys: bool) -> Vec<Vec<Cell>> {
        let mut rows = Vec::new();
        for table in self.tables.values() {
            if table_filter.is_some_and(|filter| filter != table.name) {
                continue;
            }

            for column in &table.columns {
                let mut row = vec![
                    padded(&table.name),
                    padded(&column.name),
                    padded(&column.native_type),
                ];
                if inline_keys {
                    row.push(flag(column.primary_key));
                }
                row.extend([
                    flag(column.nullable),
                    optional(column.length),
                    optional(column.precision),
                    optional(column.scale),
                ]);

                if inline_keys {
                    for _ in 0..column.extra_segments {
                        let mut segment = row.clone();
                        segment[3] = flag(false);
                        rows.push(segment);
                    }
                }
                rows.push(row);
            }
        }

        rows
    }

    fn key_rows(&self, table_filter: Option<&str>) -> Vec<Vec<Cell>> {
        self.tables
            .values()
            .filter(|table| table_filter.is_none_or(|filter| filter == table.name))
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|column| column.primary_key)
                    .map(|column| vec![padded(&table.name), padded(&column.name)])
            })
            .collect()
    }

    fn query(&self, statement: &Statement) -> Result<Vec<Row>, DriverError> {
        const COLUMN_ALIASES: &[&str] = &[
            catalog::TABLE_NAME,
            catalog::COLUMN_NAME,
            catalog::DATA_TYPE,
            catalog::IS_NULLABLE,
            catalog::CHARACTER_MAXIMUM_LENGTH,
            catalog::DATA_PRECISION,
            catalog::DATA_SCALE,
        ];
        const COLUMN_WITH_KEY_ALIASES: &[&str] = &[
            catalog::TABLE_NAME,
            catalog::COLUMN_NAME,
            catalog::DATA_TYPE,
            catalog::COLUMN_KEY,
            catalog::IS_NULLABLE,
            catalog::CHARACTER_MAXIMUM_LENGTH,
            catalog::DATA_PRECISION,
            catalog::DATA_SCALE,
        ];
        const KEY_ALIASES: &[&str] = &[catalog::TABLE_NAME, catalog::PK_FIELD_NAME];

        let sql = statement.sql.as_str();
        let rows = match sql {
            catalog::ALL_COLUMNS_QUERY => {
                catalog_rows(COLUMN_ALIASES, self.column_rows(None, false))
            }
            catalog::TABLE_COLUMNS_QUERY => {
                let table = first_param(statement)?.to_trimmed_string();
                catalog_rows(COLUMN_ALIASES, self.column_rows(table.as_deref(), false))
            }
            catalog::TABLE_COLUMNS_WITH_KEYS_QUERY => {
                let table = first_param(statement)?.to_trimmed_string();
                catalog_rows(COLUMN_WITH_KEY_ALIASES, self.column_rows(table.as_deref(), true))
            }
            catalog::ALL_PRIMARY_KEYS_QUERY => catalog_rows(KEY_ALIASES, self.key_rows(None)),
            catalog::TABLE_PRIMARY_KEYS_QUERY => {
                let table = first_param(statement)?.to_trimmed_string();
                catalog_rows(KEY_ALIASES, self.key_rows(table.as_deref()))
            }
            catalog::TABLE_EXISTS_QUERY => {
                let table = first_param(statement)?.to_trimmed_string().unwrap_or_default();
                let count = i64::from(self.tables.contains_key(&table));
                catalog_rows(&[catalog::COUNT], vec![vec![Cell::I64(count)]])
            }
            catalog::PROCEDURES_QUERY => catalog_rows(
                &[catalog::PROCEDURE_NAME, catalog::PROCEDURE_ID],
                self.procedures
                    .values()
                    .map(|procedure| vec![padded(&procedure.name), Cell::I64(procedure.id)])
                    .collect(),
            ),
            catalog::PROCEDURE_PARAMETERS_QUERY => {
                let name = first_param(statement)?.to_trimmed_string().unwrap_or_default();
                let parameters = self
                    .procedures
                    .get(&name)
                    .map(|procedure| procedure.parameters.as_slice())
                    .unwrap_or_default();

                catalog_rows(
                    &[
                        catalog::PARAMETER_NAME,
                        catalog::PARAMETER_NUMBER,
                        catalog::DATA_TYPE,
                        catalog::CHARACTER_MAXIMUM_LENGTH,
                        catalog::DATA_PRECISION,
                        catalog::DATA_SCALE,
                    ],
                    parameters
                        .iter()
                        .zip(0i64..)
                        .map(|(parameter, number)| {
                            vec![
                                padded(&parameter.name),
                                Cell::I64(number),
                                padded(&parameter.native_type),
                                optional(parameter.length),
                                optional(parameter.precision),
                                optional(parameter.scale),
                            ]
                        })
                        .collect(),
                )
            }
            _ => return self.data_query(statement),
        };

        Ok(rows)
    }

    fn data_query(&self, statement: &Statement) -> Result<Vec<Row>, DriverError> {
        let sql = statement.sql.as_str();

        if let Some(inner_sql) = sql
            .strip_prefix("SELECT COUNT(*) AS C FROM (")
            .and_then(|rest| rest.strip_suffix(") AS Q"))
        {
            let count = self.data_query(&Statement::new(inner_sql))?.len();
            return Ok(catalog_rows(&[catalog::COUNT], vec![vec![Cell::I64(count as i64)]]));
        }

        if let Some(rest) = sql.strip_prefix("SELECT COUNT(*) AS C FROM ") {
            let (table, key_column) = table_and_key(rest);
            let count = self.select(statement, &table, key_column.as_deref())?.len();
            return Ok(catalog_rows(&[catalog::COUNT], vec![vec![Cell::I64(count as i64)]]));
        }

        if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            let (table, key_column) = table_and_key(rest);
            return self.select(statement, &table, key_column.as_deref());
        }

        Err(unsupported(sql))
    }

    fn select(
        &self,
        statement: &Statement,
        table: &str,
        key_column: Option<&str>,
    ) -> Result<Vec<Row>, DriverError> {
        let table = self.table(table)?;

        let Some(key_column) = key_column else {
            return Ok(table.rows.iter().map(|row| table.to_row(row)).collect());
        };

        let index = table.column_index(key_column)?;
        let key = first_param(statement)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| keys_equal(&row[index], key))
            .map(|row| table.to_row(row))
            .collect())
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, DriverError> {
        let sql = statement.sql.as_str();

        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            return self.create_table(rest).map(|()| 0);
        }

        if let Some(rest) = sql.strip_prefix("DROP TABLE ") {
            let name = unquote(rest);
            return match self.tables.remove(&name) {
                Some(_) => Ok(0),
                None => Err(table_unknown(&name)),
            };
        }

        if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let (table, key_column) = table_and_key(rest);
            let key_column = key_column.ok_or_else(|| unsupported(sql))?;
            let key = first_param(statement)?.clone();

            let table = self.table_mut(&table)?;
            let index = table.column_index(&key_column)?;
            let before = table.rows.len();
            table.rows.retain(|row| !keys_equal(&row[index], &key));

            return Ok((before - table.rows.len()) as u64);
        }

        if let Some(rest) = sql.strip_prefix("UPDATE OR INSERT INTO ") {
            let (target, matching) = rest
                .split_once(" MATCHING (")
                .ok_or_else(|| unsupported(sql))?;
            let (table, columns) = insert_target(target).ok_or_else(|| unsupported(sql))?;
            let key_columns = quoted_list(matching.trim_end_matches(')'));
            return self.upsert(&table, &columns, &statement.params, &key_columns);
        }

        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            let (table, columns) = insert_target(rest).ok_or_else(|| unsupported(sql))?;
            return self.insert(&table, &columns, &statement.params);
        }

        if let Some(rest) = sql.strip_prefix("UPDATE ") {
            return self.update(rest, &statement.params).ok_or_else(|| unsupported(sql))?;
        }

        if let Some(rest) = sql.strip_prefix("EXECUTE PROCEDURE ") {
            let name = unquote(rest.split_once(" (").map_or(rest, |(name, _)| name));
            let procedure = self.procedures.get_mut(&name).ok_or_else(|| {
                DriverError::query(format!("Procedure unknown\n{name}"))
            })?;
            if procedure.parameters.len() != statement.params.len() {
                return Err(DriverError::query(format!(
                    "Input parameter mismatch for procedure {name}"
                )));
            }
            procedure.calls.push(statement.params.clone());

            return Ok(0);
        }

        Err(unsupported(sql))
    }

    fn create_table(&mut self, rest: &str) -> Result<(), DriverError> {
        let (name, body) = rest
            .split_once(" (\n")
            .ok_or_else(|| unsupported(rest))?;
        let name = unquote(name);
        if self.tables.contains_key(&name) {
            return Err(DriverError::query(format!(
                "unsuccessful metadata update\nTable {name} already exists"
            ))
            .with_gds_code(gds::NO_META_UPDATE));
        }

        let body = body.strip_suffix(')').ok_or_else(|| unsupported(rest))?;
        let mut table = MemoryTable::new(&name);
        let mut keys = Vec::new();
        for line in body.split(",\n") {
            if let Some((_, key_list)) = line.split_once("PRIMARY KEY (") {
                keys = quoted_list(key_list.trim_end_matches(')'));
                continue;
            }

            let line = line.trim().trim_start_matches('"');
            let (column_name, ddl) = line.split_once('"').ok_or_else(|| unsupported(rest))?;
            let (ddl, not_null) = match ddl.trim().strip_suffix(" NOT NULL") {
                Some(ddl) => (ddl, true),
                None => (ddl.trim(), false),
            };

            let mut column = MemoryColumn::from_ddl(column_name, ddl);
            column.nullable = !not_null;
            table.columns.push(column);
        }

        for column in &mut table.columns {
            column.primary_key = keys.contains(&column.name);
        }

        self.tables.insert(name, table);
        Ok(())
    }

    fn insert(
        &mut self,
        table: &str,
        columns: &[String],
        params: &[Cell],
    ) -> Result<u64, DriverError> {
        let table = self.table_mut(table)?;
        let row = build_row(table, columns, params)?;

        let key_indexes: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index)
            .collect();
        let duplicate = !key_indexes.is_empty()
            && table
                .rows
                .iter()
                .any(|existing| key_indexes.iter().all(|&i| keys_equal(&existing[i], &row[i])));
        if duplicate {
            return Err(DriverError::query(format!(
                "violation of PRIMARY or UNIQUE KEY constraint on table \"{}\"",
                table.name
            ))
            .with_gds_code(gds::UNIQUE_KEY_VIOLATION));
        }

        table.rows.push(row);
        Ok(1)
    }

    fn upsert(
        &mut self,
        table: &str,
        columns: &[String],
        params: &[Cell],
        key_columns: &[String],
    ) -> Result<u64, DriverError> {
        let table = self.table_mut(table)?;
        let row = build_row(table, columns, params)?;
        let key_indexes = key_columns
            .iter()
            .map(|column| table.column_index(column))
            .collect::<Result<Vec<_>, _>>()?;

        let existing = table
            .rows
            .iter_mut()
            .find(|existing| key_indexes.iter().all(|&i| keys_equal(&existing[i], &row[i])));
        match existing {
            Some(existing) => {
                for column in columns {
                    let index = table.columns.iter().position(|c| &c.name == column);
                    if let Some(index) = index {
                        existing[index] = row[index].clone();
                    }
                }
            }
            None => table.rows.push(row),
        }

        Ok(1)
    }

    /// Interprets `"T" SET "A" = ?, "B" = ? WHERE "K" = ?`.
    fn update(&mut self, rest: &str, params: &[Cell]) -> Option<Result<u64, DriverError>> {
        let (table, rest) = rest.split_once(" SET ")?;
        let (assignments, condition) = rest.split_once(" WHERE ")?;
        let columns: Vec<String> = assignments
            .split(", ")
            .map(|assignment| {
                unquote(assignment.trim_end_matches('?').trim_end().trim_end_matches('='))
            })
            .collect();
        let key_column = unquote(condition.trim_end_matches('?').trim_end().trim_end_matches('='));
        let (key, values) = params.split_last()?;

        Some(self.update_rows(&unquote(table), &key_column, &columns, key, values))
    }

    fn update_rows(
        &mut self,
        table: &str,
        key_column: &str,
        columns: &[String],
        key: &Cell,
        values: &[Cell],
    ) -> Result<u64, DriverError> {
        let table = self.table_mut(table)?;
        let key_index = table.column_index(key_column)?;
        let indexes = columns
            .iter()
            .map(|column| table.column_index(column))
            .collect::<Result<Vec<_>, _>>()?;

        let mut updated = 0;
        for row in table.rows.iter_mut().filter(|row| keys_equal(&row[key_index], key)) {
            for (&index, value) in indexes.iter().zip(values) {
                row[index] = value.clone();
            }
            updated += 1;
        }

        Ok(updated)
    }
}

/// Splits `"T" ("A", "B") VALUES (?, ?)` into the table and its column list.
fn insert_target(target: &str) -> Option<(String, Vec<String>)> {
    let (table, rest) = target.split_once(" (")?;
    let (columns, _) = rest.split_once(") VALUES (")?;
    Some((unquote(table), quoted_list(columns)))
}

fn build_row(
    table: &MemoryTable,
    columns: &[String],
    params: &[Cell],
) -> Result<Vec<Cell>, DriverError> {
    if columns.len() != params.len() {
        return Err(DriverError::query("Count of column list and value list don't match"));
    }

    let mut row = vec![Cell::Null; table.columns.len()];
    for (column, value) in columns.iter().zip(params) {
        row[table.column_index(column)?] = value.clone();
    }

    Ok(row)
}
