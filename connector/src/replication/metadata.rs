use chrono::{DateTime, NaiveDateTime, Utc};
use firebird::executor::{Connection, ConnectionFactory, Row, Statement};
use firebird::identifier::quote_identifier;
use firebird::types::Cell;
use tracing::{error, info, warn};

use crate::connection::{close_connection, fetch_count, fetch_first};
use crate::error::{ConnectorError, ConnectorResult, ErrorKind};
use crate::replication::{
    METADATA_COLUMNS, METADATA_JOB_ID, METADATA_REQUEST, METADATA_SHAPE_ID, METADATA_SHAPE_NAME,
    METADATA_TABLE_NAME, METADATA_TIMESTAMP, ReplicationTable, ensure_table,
};
use crate::types::PrepareWriteRequest;
use crate::{bail, connector_error};

/// State of a replication job as of its last prepare-write.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationMetaData {
    /// Snapshot of the prepare-write request.
    pub request: PrepareWriteRequest,
    pub replicated_shape_id: String,
    pub replicated_shape_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ReplicationMetaData {
    /// Metadata describing `request`, stamped with the current time.
    pub fn for_request(request: PrepareWriteRequest) -> Self {
        Self {
            replicated_shape_id: request.schema.id.clone(),
            replicated_shape_name: request.schema.name.clone(),
            timestamp: Utc::now(),
            request,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.request.data_versions.job_id
    }

    fn from_row(row: &Row) -> ConnectorResult<Self> {
        let Some(request) = row.get_string(METADATA_REQUEST) else {
            bail!(
                ErrorKind::InvalidData,
                "Replication metadata has no request snapshot"
            );
        };
        let timestamp = row.get_string(METADATA_TIMESTAMP).unwrap_or_default();

        Ok(Self {
            request: serde_json::from_str(&request)?,
            replicated_shape_id: row.get_string(METADATA_SHAPE_ID).unwrap_or_default(),
            replicated_shape_name: row.get_string(METADATA_SHAPE_NAME).unwrap_or_default(),
            timestamp: parse_timestamp(&timestamp),
        })
    }
}

/// Local-time layouts found in metadata rows that predate RFC 3339 timestamps.
const LEGACY_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

/// Reads a stored timestamp. Layouts without an offset are taken as UTC, and unreadable
/// values fall back to the current time since the timestamp never decides a drop.
fn parse_timestamp(timestamp: &str) -> DateTime<Utc> {
    let timestamp = timestamp.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return parsed.with_timezone(&Utc);
    }

    let legacy = LEGACY_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok());
    match legacy {
        Some(parsed) => parsed.and_utc(),
        None => {
            warn!(timestamp, "unreadable replication metadata timestamp, using current time");
            Utc::now()
        }
    }
}

/// The table holding one metadata row per job.
pub fn metadata_table() -> ReplicationTable {
    ReplicationTable {
        table_name: METADATA_TABLE_NAME.to_string(),
        columns: METADATA_COLUMNS.to_vec(),
    }
}

fn where_job_id() -> String {
    format!("WHERE {} = ?", quote_identifier(METADATA_JOB_ID))
}

/// Loads the metadata stored for `job_id`, creating the metadata table on first use.
pub async fn get_previous_metadata<F>(
    factory: &F,
    table: &ReplicationTable,
    job_id: &str,
) -> ConnectorResult<Option<ReplicationMetaData>>
where
    F: ConnectionFactory,
{
    ensure_table(factory, table).await?;

    let table_name = quote_identifier(&table.table_name);
    let count = Statement::new(format!(
        "SELECT COUNT(*) AS C FROM {table_name} {}",
        where_job_id()
    ))
    .bind(job_id);
    let select =
        Statement::new(format!("SELECT * FROM {table_name} {}", where_job_id())).bind(job_id);

    let mut connection = factory.connect(None).await?;
    let result = async {
        if fetch_count(&mut connection, &count).await? == 0 {
            return Ok(None);
        }

        match fetch_first(&mut connection, &select).await? {
            Some(row) => ReplicationMetaData::from_row(&row).map(Some),
            None => Ok(None),
        }
    }
    .await;

    close_connection(connection, result).await
}

fn insert_statement(table: &ReplicationTable, values: &[Cell; 5]) -> Statement {
    let columns = [
        METADATA_JOB_ID,
        METADATA_REQUEST,
        METADATA_SHAPE_ID,
        METADATA_SHAPE_NAME,
        METADATA_TIMESTAMP,
    ]
    .map(quote_identifier);

    Statement::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?)",
            quote_identifier(&table.table_name),
            columns.join(", ")
        ),
        values.to_vec(),
    )
}

fn update_statement(table: &ReplicationTable, values: &[Cell; 5]) -> Statement {
    let assignments = [
        METADATA_REQUEST,
        METADATA_SHAPE_ID,
        METADATA_SHAPE_NAME,
        METADATA_TIMESTAMP,
    ]
    .map(|column| format!("{} = ?", quote_identifier(column)));

    let [job_id, rest @ ..] = values.clone();
    let mut params = rest.to_vec();
    params.push(job_id);

    Statement::with_params(
        format!(
            "UPDATE {} SET {} {}",
            quote_identifier(&table.table_name),
            assignments.join(", "),
            where_job_id()
        ),
        params,
    )
}

/// Stores `metadata`, replacing the row of the same job.
///
/// An existing row selects an update, a missing one an insert. When that statement fails the
/// other one is tried, and when both fail the returned error holds both failures.
pub async fn upsert_metadata<F>(
    factory: &F,
    table: &ReplicationTable,
    metadata: &ReplicationMetaData,
) -> ConnectorResult<()>
where
    F: ConnectionFactory,
{
    let values = [
        Cell::from(metadata.job_id()),
        Cell::String(serde_json::to_string(&metadata.request)?),
        Cell::from(metadata.replicated_shape_id.as_str()),
        Cell::from(metadata.replicated_shape_name.as_str()),
        Cell::String(metadata.timestamp.to_rfc3339()),
    ];
    let insert = insert_statement(table, &values);
    let update = update_statement(table, &values);
    let count = Statement::new(format!(
        "SELECT COUNT(*) AS C FROM {} {}",
        quote_identifier(&table.table_name),
        where_job_id()
    ))
    .bind(metadata.job_id());

    let mut connection = factory.connect(None).await?;
    let result = async {
        let exists = fetch_count(&mut connection, &count).await? > 0;
        let (first, fallback) = if exists {
            (&update, &insert)
        } else {
            (&insert, &update)
        };

        let first_err = match connection.execute(first).await {
            Ok(_) => return Ok(()),
            Err(err) => ConnectorError::from(err),
        };

        match connection.execute(fallback).await {
            Ok(_) => {
                warn!(
                    job_id = metadata.job_id(),
                    error = %first_err,
                    "metadata write fell back to the alternate statement"
                );
                Ok(())
            }
            Err(err) => {
                let fallback_err = ConnectorError::from(err);
                let (first_op, fallback_op) = if exists {
                    ("update", "insert")
                } else {
                    ("insert", "update")
                };
                error!(
                    job_id = metadata.job_id(),
                    error = %first_err,
                    "metadata {first_op} failed"
                );
                error!(
                    job_id = metadata.job_id(),
                    error = %fallback_err,
                    "metadata {fallback_op} failed"
                );

                Err(ConnectorError::from(vec![
                    connector_error!(
                        ErrorKind::MetadataUpsertFailed,
                        "Replication metadata could not be written",
                        metadata.job_id()
                    ),
                    first_err,
                    fallback_err,
                ]))
            }
        }
    }
    .await;

    let result = close_connection(connection, result).await;
    if result.is_ok() {
        info!(job_id = metadata.job_id(), "updated replication metadata");
    }

    result
}
