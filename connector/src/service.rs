//! Operations offered to the plugin host.
//!
//! [`Connector`] ties discovery, reads and writes to one connection factory and its settings.
//! The host drives it through plain request and response values; transport framing lives
//! outside this crate.

use std::sync::Arc;

use config::shared::{
    ConnectorConfig, FirebirdConnectionConfig, replication_form_schema_json,
    replication_form_ui_json,
};
use firebird::executor::{Connection, ConnectionFactory};
use futures::{Stream, StreamExt};
use tracing::{info, warn};

use crate::bail;
use crate::discovery::{discover_all, refresh_schemas};
use crate::error::{ConnectorResult, ErrorKind};
use crate::read::read_records;
use crate::replication::{Replication, WriteGate, reconcile_replication_job, replication_settings};
use crate::schema::{PortableSchema, RecordMap};
use crate::types::{
    DiscoverMode, DiscoverRequest, DiscoverResponse, PrepareWriteRequest, ReadRequest, Record,
    RecordAck,
};
use crate::write::{
    WriteSettings, execute_procedure, list_procedures, schema_for_procedure,
    write_form_schema_json,
};

/// Checks connection settings without touching the network.
///
/// The first missing field is reported with the host's message for it.
pub fn validate_connection_config(config: &FirebirdConnectionConfig) -> ConnectorResult<()> {
    config.validate()?;
    Ok(())
}

/// Form shown to the user when configuring a write.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureWriteResponse {
    pub form_schema_json: String,
    /// Write schema of the selected procedure, when the form names one.
    pub schema: Option<PortableSchema>,
}

/// Form shown to the user when configuring replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureReplicationResponse {
    pub form_schema_json: String,
    pub form_ui_json: String,
}

/// Where prepared writes go.
#[derive(Debug)]
enum WriteContext<F> {
    Replication(Replication<Arc<F>>),
    Procedure {
        factory: Arc<F>,
        schema: PortableSchema,
    },
}

impl<F> WriteContext<F>
where
    F: ConnectionFactory,
{
    async fn write_record(&self, record: &Record) -> RecordAck {
        match self {
            WriteContext::Replication(replication) => replication.write_record(record).await,
            WriteContext::Procedure { factory, schema } => {
                execute_procedure(factory, schema, record).await
            }
        }
    }
}

/// A Firebird connector bound to one database.
#[derive(Debug)]
pub struct Connector<F> {
    factory: Arc<F>,
    config: ConnectorConfig,
    gate: WriteGate,
    write_context: Option<WriteContext<F>>,
}

impl<F> Connector<F>
where
    F: ConnectionFactory,
{
    /// Validates `config` and checks that a connection can be opened.
    ///
    /// Replication writes of every connector created this way are serialized through
    /// [`WriteGate::shared`].
    pub async fn connect(factory: F, config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_gate(factory, config, WriteGate::shared()).await
    }

    /// Same as [`Connector::connect`], serializing replication writes through `gate`.
    pub async fn with_gate(
        factory: F,
        config: ConnectorConfig,
        gate: WriteGate,
    ) -> ConnectorResult<Self> {
        validate_connection_config(&config.connection)?;

        let connection = factory.connect(None).await?;
        connection.close().await?;

        info!(
            host = %config.connection.host,
            database = %config.connection.database,
            "connected to firebird"
        );

        Ok(Self {
            factory: Arc::new(factory),
            config,
            gate,
            write_context: None,
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn write_gate(&self) -> &WriteGate {
        &self.gate
    }

    /// Discovers every table, or refreshes the schemas named in `request`.
    pub async fn discover(&self, request: DiscoverRequest) -> ConnectorResult<DiscoverResponse> {
        let sample_size = match request.sample_size {
            0 => self.config.discovery.sample_size,
            sample_size => sample_size,
        };

        let schemas = match request.mode {
            DiscoverMode::All => discover_all(self.factory.as_ref(), sample_size).await?,
            DiscoverMode::Refresh => {
                refresh_schemas(self.factory.as_ref(), request.to_refresh, sample_size).await?
            }
        };

        Ok(DiscoverResponse { schemas })
    }

    /// Streams the records of the requested schema.
    pub fn read<'a>(
        &'a self,
        request: &'a ReadRequest,
    ) -> impl Stream<Item = ConnectorResult<RecordMap>> + Send + 'a {
        let limit = (request.limit > 0).then_some(request.limit);
        info!(schema_id = %request.schema.id, job_id = %request.job_id, ?limit, "starting read");

        read_records(self.factory.as_ref(), &request.schema, limit)
    }

    pub fn configure_replication(&self) -> ConfigureReplicationResponse {
        ConfigureReplicationResponse {
            form_schema_json: replication_form_schema_json(),
            form_ui_json: replication_form_ui_json(),
        }
    }

    /// Lists procedures for the write form and builds the schema of the selected one.
    pub async fn configure_write(
        &self,
        form_data_json: &str,
    ) -> ConnectorResult<ConfigureWriteResponse> {
        let procedures = list_procedures(self.factory.as_ref()).await?;
        let form_schema_json = write_form_schema_json(&procedures);

        if form_data_json.trim().is_empty() {
            return Ok(ConfigureWriteResponse {
                form_schema_json,
                schema: None,
            });
        }

        let settings: WriteSettings = serde_json::from_str(form_data_json)?;
        let selected = procedures
            .iter()
            .find(|procedure| procedure.safe_name() == settings.stored_procedure.trim());

        let schema = match selected {
            Some(procedure) => Some(schema_for_procedure(self.factory.as_ref(), procedure).await?),
            None => {
                warn!(procedure = %settings.stored_procedure, "selected stored procedure not found");
                None
            }
        };

        Ok(ConfigureWriteResponse {
            form_schema_json,
            schema,
        })
    }

    /// Prepares the following writes.
    ///
    /// Requests with replication settings reconcile the job's destination tables and route
    /// records to them. Others call the stored procedure named by the schema.
    pub async fn prepare_write(&mut self, request: PrepareWriteRequest) -> ConnectorResult<()> {
        let context = if request.replication.is_some() {
            reconcile_replication_job(self.factory.as_ref(), &request).await?;
            let settings = replication_settings(&request)?;

            WriteContext::Replication(Replication::new(
                Arc::clone(&self.factory),
                request.schema,
                &settings,
                self.gate.clone(),
            ))
        } else {
            WriteContext::Procedure {
                factory: Arc::clone(&self.factory),
                schema: request.schema,
            }
        };

        info!(job_id = %request.data_versions.job_id, "prepared write");
        self.write_context = Some(context);

        Ok(())
    }

    /// Writes `records` in order, yielding one acknowledgement per record.
    ///
    /// Failed records are acknowledged with their error and the stream continues.
    pub fn write<'a, S>(
        &'a self,
        records: S,
    ) -> ConnectorResult<impl Stream<Item = RecordAck> + Send + 'a>
    where
        S: Stream<Item = Record> + Send + 'a,
    {
        let Some(context) = &self.write_context else {
            bail!(
                ErrorKind::WriteNotPrepared,
                "Write was requested before prepare write"
            );
        };

        Ok(records.then(move |record| async move { context.write_record(&record).await }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_reports_host_messages() {
        let config = FirebirdConnectionConfig {
            host: "db".to_string(),
            port: 3050,
            database: String::new(),
            username: "SYSDBA".to_string(),
            password: None,
        };

        let err = validate_connection_config(&config).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.message(), "The Database property must be set");
    }
}
