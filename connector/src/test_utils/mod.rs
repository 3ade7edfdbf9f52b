//! Helpers for testing the connector without a Firebird server.
//!
//! [`memory::MemoryDatabase`] stands in for the driver. The fixtures below build the tables
//! and requests most tests start from.

pub mod memory;

use config::shared::{ConnectorConfig, DiscoveryConfig, FirebirdConnectionConfig};
use firebird::types::{Cell, native};

use crate::schema::PortableSchema;
use crate::types::{DataVersions, PrepareWriteRequest, ReplicationWriteRequest};
use memory::{MemoryColumn, MemoryDatabase, MemoryTable};

pub const PERSONS_TABLE: &str = "PERSONS";

/// `PERSONS` with four nullable text columns and an integer key, filled with `rows` rows.
pub fn persons_table(rows: usize) -> MemoryTable {
    let mut table = MemoryTable::new(PERSONS_TABLE)
        .column(MemoryColumn::varchar("LASTNAME", 255))
        .column(MemoryColumn::varchar("FIRSTNAME", 255))
        .column(MemoryColumn::varchar("ADDRESS", 255))
        .column(MemoryColumn::varchar("CITY", 255))
        .column(MemoryColumn::new("PERSONID", native::INTEGER).primary_key());

    for i in 0..rows {
        let id = i as i64 + 1;
        table = table.row(vec![
            Cell::String(format!("Last{id}")),
            Cell::String(format!("First{id}")),
            Cell::String(format!("{id} Main St")),
            Cell::from("Springfield"),
            Cell::I32(id as i32),
        ]);
    }

    table
}

/// A database holding only [`persons_table`].
pub async fn persons_database(rows: usize) -> MemoryDatabase {
    let database = MemoryDatabase::new();
    database.add_table(persons_table(rows)).await;
    database
}

pub fn test_config() -> ConnectorConfig {
    ConnectorConfig {
        connection: FirebirdConnectionConfig {
            host: "localhost".to_string(),
            port: 3050,
            database: "/data/test.fdb".to_string(),
            username: "SYSDBA".to_string(),
            password: Some("masterkey".to_string().into()),
        },
        discovery: DiscoveryConfig::default(),
    }
}

/// A replication prepare-write request for `schema`.
pub fn replication_request(
    schema: PortableSchema,
    golden_table: &str,
    version_table: &str,
    job_data_version: i64,
    shape_data_version: i64,
) -> PrepareWriteRequest {
    PrepareWriteRequest {
        schema,
        replication: Some(ReplicationWriteRequest {
            settings_json: format!(
                r#"{{"GoldenTableName":"{golden_table}","VersionTableName":"{version_table}"}}"#
            ),
        }),
        data_versions: DataVersions {
            job_id: "job-1".to_string(),
            shape_id: "shape-1".to_string(),
            job_data_version,
            shape_data_version,
        },
    }
}
