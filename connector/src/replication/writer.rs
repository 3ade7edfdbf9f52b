use std::sync::{Arc, LazyLock};
use std::time::Instant;

use config::shared::ReplicationSettings;
use firebird::executor::ConnectionFactory;
use firebird::identifier::is_escaped;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

use crate::error::ConnectorResult;
use crate::replication::{
    REPLICATION_RECORD_ID, REPLICATION_VERSION_IDS, REPLICATION_VERSION_RECORD_ID,
    ReplicationTable, delete_record, get_record, golden_table, record_exists, upsert_record,
    version_table,
};
use crate::schema::{PortableSchema, RecordMap};
use crate::types::{Record, RecordAck};

/// Gate handed to every [`crate::service::Connector`] of the process.
static SHARED_WRITE_GATE: LazyLock<WriteGate> = LazyLock::new(WriteGate::new);

/// Serializes record writes across every replication job that holds the same gate.
///
/// Clones share the same lock. [`WriteGate::shared`] is the process-wide gate connectors use.
#[derive(Debug, Clone, Default)]
pub struct WriteGate(Arc<Mutex<()>>);

impl WriteGate {
    /// Creates a gate that is independent of every other gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide gate.
    pub fn shared() -> Self {
        SHARED_WRITE_GATE.clone()
    }

    /// Waits for the gate and holds it until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }

    /// Returns whether a write or a [`WriteGate::lock`] guard currently holds the gate.
    pub fn is_locked(&self) -> bool {
        self.0.try_lock().is_err()
    }

    pub fn same_gate(&self, other: &WriteGate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn normalize_key(key: &str) -> String {
    if is_escaped(key) {
        key.to_string()
    } else {
        key.trim().to_uppercase()
    }
}

/// Re-keys a record's data by property name.
///
/// Keys are matched against each property's id and name after normalization: unescaped keys
/// are trimmed and upper cased, quoted keys are compared as they are. Data without a matching
/// property is dropped.
pub fn named_record_data(schema: &PortableSchema, data_json: &str) -> ConnectorResult<RecordMap> {
    let data: RecordMap = if data_json.trim().is_empty() {
        RecordMap::new()
    } else {
        serde_json::from_str(data_json)?
    };

    let normalized: RecordMap = data
        .into_iter()
        .map(|(key, value)| (normalize_key(&key), value))
        .collect();

    let mut named = RecordMap::new();
    for property in &schema.properties {
        let value = normalized
            .get(&normalize_key(&property.id))
            .or_else(|| normalized.get(&normalize_key(&property.name)));

        if let Some(value) = value {
            named.insert(property.name.clone(), value.clone());
        }
    }

    Ok(named)
}

/// Writes records of one replication job into its golden and version tables.
#[derive(Debug, Clone)]
pub struct Replication<F> {
    factory: F,
    schema: PortableSchema,
    golden: ReplicationTable,
    version: ReplicationTable,
    gate: WriteGate,
}

impl<F> Replication<F>
where
    F: ConnectionFactory,
{
    pub fn new(
        factory: F,
        schema: PortableSchema,
        settings: &ReplicationSettings,
        gate: WriteGate,
    ) -> Self {
        Self {
            golden: golden_table(&schema, &settings.golden_table_name),
            version: version_table(&schema, &settings.version_table_name),
            factory,
            schema,
            gate,
        }
    }

    pub fn golden_table(&self) -> &ReplicationTable {
        &self.golden
    }

    pub fn version_table(&self) -> &ReplicationTable {
        &self.version
    }

    /// Replicates `record` and acknowledges it. Failures are reported in the ack.
    pub async fn write_record(&self, record: &Record) -> RecordAck {
        let _guard = self.gate.lock().await;
        let started = Instant::now();

        match self.try_write_record(record).await {
            Ok(()) => {
                debug!(
                    record_id = %record.record_id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "acknowledged record"
                );
                RecordAck::success(&record.correlation_id)
            }
            Err(err) => {
                error!(record_id = %record.record_id, error = %err, "error replicating record");
                debug!(
                    record_id = %record.record_id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "failed record"
                );
                RecordAck::failure(&record.correlation_id, err.message())
            }
        }
    }

    async fn previous_version_ids(
        &self,
        record: &Record,
        current: &[String],
    ) -> ConnectorResult<Vec<String>> {
        if !record_exists(&self.factory, &self.golden, &record.record_id).await? {
            return Ok(current.to_vec());
        }

        let row = get_record(&self.factory, &self.golden, &record.record_id).await?;
        match row.as_ref().and_then(|row| row.get(REPLICATION_VERSION_IDS)) {
            Some(Value::String(json)) => Ok(serde_json::from_str(json)?),
            Some(Value::Array(ids)) => Ok(ids
                .iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()),
            _ => Ok(current.to_vec()),
        }
    }

    async fn try_write_record(&self, record: &Record) -> ConnectorResult<()> {
        let version_ids: Vec<String> = record
            .versions
            .iter()
            .map(|version| version.record_id.clone())
            .collect();

        let mut data = named_record_data(&self.schema, &record.data_json)?;
        let delete_all = data.is_empty();
        data.insert(
            REPLICATION_RECORD_ID.to_string(),
            Value::String(record.record_id.clone()),
        );
        data.insert(
            REPLICATION_VERSION_IDS.to_string(),
            Value::from(version_ids.clone()),
        );

        let previous_ids = self.previous_version_ids(record, &version_ids).await?;

        if delete_all {
            debug!(record_id = %record.record_id, "deleting record");
            delete_record(&self.factory, &self.golden, &record.record_id).await?;

            for version_id in &previous_ids {
                debug!(record_id = %record.record_id, %version_id, "deleting version");
                delete_record(&self.factory, &self.version, version_id).await?;
            }

            return Ok(());
        }

        debug!(record_id = %record.record_id, "upserting record");
        upsert_record(&self.factory, &self.golden, &data).await?;

        for version_id in previous_ids.iter().filter(|id| !version_ids.contains(id)) {
            debug!(record_id = %record.record_id, %version_id, "deleting version");
            delete_record(&self.factory, &self.version, version_id).await?;
        }

        for version in &record.versions {
            debug!(
                record_id = %record.record_id,
                version_id = %version.record_id,
                "upserting version"
            );
            let mut version_data = named_record_data(&self.schema, &version.data_json)?;
            version_data.insert(
                REPLICATION_VERSION_RECORD_ID.to_string(),
                Value::String(version.record_id.clone()),
            );
            version_data.insert(
                REPLICATION_RECORD_ID.to_string(),
                Value::String(record.record_id.clone()),
            );
            upsert_record(&self.factory, &self.version, &version_data).await?;
        }

        Ok(())
    }
}
