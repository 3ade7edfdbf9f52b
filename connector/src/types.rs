//! Request and response payloads exchanged with the plugin host.

use serde::{Deserialize, Serialize};

use crate::schema::PortableSchema;

/// Which schemas a discovery call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoverMode {
    #[default]
    All,
    Refresh,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DiscoverRequest {
    pub mode: DiscoverMode,
    /// Sample rows per schema. Zero selects the configured default.
    pub sample_size: usize,
    /// Schemas to refresh when `mode` is [`DiscoverMode::Refresh`].
    pub to_refresh: Vec<PortableSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DiscoverResponse {
    pub schemas: Vec<PortableSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReadRequest {
    pub schema: PortableSchema,
    /// Maximum number of records. Zero means unlimited.
    pub limit: usize,
    pub job_id: String,
}

/// Monotonic counters for a job. An increase forces the destination tables to be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DataVersions {
    pub job_id: String,
    pub shape_id: String,
    pub job_data_version: i64,
    pub shape_data_version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReplicationWriteRequest {
    /// Replication form payload, see [`config::shared::ReplicationSettings`].
    pub settings_json: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PrepareWriteRequest {
    pub schema: PortableSchema,
    /// Present for replication jobs; absent for stored-procedure writes.
    pub replication: Option<ReplicationWriteRequest>,
    pub data_versions: DataVersions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordAction {
    #[default]
    Upsert,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RecordVersion {
    pub record_id: String,
    pub data_json: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Record {
    pub record_id: String,
    pub correlation_id: String,
    /// JSON object keyed by property id.
    pub data_json: String,
    pub action: RecordAction,
    pub versions: Vec<RecordVersion>,
}

/// Outcome of writing one record. `error` is empty on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RecordAck {
    pub correlation_id: String,
    pub error: String,
}

impl RecordAck {
    pub fn success(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            error: String::new(),
        }
    }

    pub fn failure(correlation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
