//! Replication of host records into golden and version tables.
//!
//! A replication job writes the current state of every record to a golden table and each of
//! its versions to a version table. Job state is kept in a metadata table so later
//! prepare-write calls can tell when the destination tables must be rebuilt.

mod metadata;
mod reconcile;
mod tables;
mod writer;

use std::borrow::Cow;

pub use metadata::{ReplicationMetaData, get_previous_metadata, metadata_table, upsert_metadata};
pub use reconcile::{DropReason, ReconcileOutcome, reconcile_replication_job, replication_settings};
pub use tables::{
    create_table_sql, delete_record, drop_table, ensure_table, get_record, golden_table,
    record_exists, table_from_schema, upsert_record, version_table,
};
pub use writer::{Replication, WriteGate, named_record_data};

/// Golden table key column holding the host's record id.
pub const REPLICATION_RECORD_ID: &str = "NaveegoReplicationRecordId";
/// Golden table column holding the serialized list of version ids.
pub const REPLICATION_VERSION_IDS: &str = "NaveegoVersionIds";
/// Version table key column holding the host's version id.
pub const REPLICATION_VERSION_RECORD_ID: &str = "NaveegoReplicationVersionRecordId";

pub const METADATA_TABLE_NAME: &str = "NaveegoReplicationMetaData";
pub const METADATA_JOB_ID: &str = "NaveegoJobId";
pub const METADATA_REQUEST: &str = "Request";
pub const METADATA_SHAPE_ID: &str = "NaveegoShapeId";
pub const METADATA_SHAPE_NAME: &str = "NaveegoShapeName";
pub const METADATA_TIMESTAMP: &str = "Timestamp";

const ID_DDL: &str = "VARCHAR(255)";
const TEXT_DDL: &str = "BLOB SUB_TYPE 1";

/// Layout of the metadata table, one row per job id.
pub const METADATA_COLUMNS: &[ReplicationColumn] = &[
    ReplicationColumn::new_static(METADATA_JOB_ID, ID_DDL, true),
    ReplicationColumn::new_static(METADATA_REQUEST, TEXT_DDL, false),
    ReplicationColumn::new_static(METADATA_SHAPE_ID, ID_DDL, false),
    ReplicationColumn::new_static(METADATA_SHAPE_NAME, TEXT_DDL, false),
    ReplicationColumn::new_static(METADATA_TIMESTAMP, ID_DDL, false),
];

/// A destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationColumn {
    pub column_name: Cow<'static, str>,
    /// DDL fragment used when creating the column.
    pub data_type: Cow<'static, str>,
    /// Whether the column is part of the table's key.
    pub primary_key: bool,
    /// Whether values are stored as their JSON text.
    pub serialize: bool,
}

impl ReplicationColumn {
    pub fn new(
        column_name: impl Into<Cow<'static, str>>,
        data_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            primary_key: false,
            serialize: false,
        }
    }

    const fn new_static(
        column_name: &'static str,
        data_type: &'static str,
        primary_key: bool,
    ) -> Self {
        Self {
            column_name: Cow::Borrowed(column_name),
            data_type: Cow::Borrowed(data_type),
            primary_key,
            serialize: false,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_serialize(mut self) -> Self {
        self.serialize = true;
        self
    }
}

/// A destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTable {
    pub table_name: String,
    pub columns: Vec<ReplicationColumn>,
}

impl ReplicationTable {
    /// The first key column, used to address single rows.
    pub fn key_column(&self) -> Option<&ReplicationColumn> {
        self.columns.iter().find(|column| column.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ReplicationColumn> {
        self.columns.iter().find(|column| column.column_name == name)
    }
}
