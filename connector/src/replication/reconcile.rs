use std::fmt;

use config::shared::ReplicationSettings;
use firebird::executor::ConnectionFactory;
use tracing::info;

use crate::bail;
use crate::error::{ConnectorResult, ErrorKind};
use crate::replication::{
    ReplicationMetaData, drop_table, ensure_table, get_previous_metadata, golden_table,
    metadata_table, table_from_schema, upsert_metadata, version_table,
};
use crate::types::PrepareWriteRequest;

/// Why a previously created destination table is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    GoldenNameChanged,
    VersionNameChanged,
    JobDataVersionChanged,
    ShapeDataVersionChanged,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::GoldenNameChanged => "Golden record name changed",
            DropReason::VersionNameChanged => "Version name changed",
            DropReason::JobDataVersionChanged => "Job data version changed",
            DropReason::ShapeDataVersionChanged => "Shape data version changed",
        };
        f.write_str(reason)
    }
}

/// What [`reconcile_replication_job`] decided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether no metadata existed for the job.
    pub first_run: bool,
    pub golden_dropped: Option<DropReason>,
    pub version_dropped: Option<DropReason>,
}

/// Parses the replication settings carried by a prepare-write request.
pub fn replication_settings(request: &PrepareWriteRequest) -> ConnectorResult<ReplicationSettings> {
    let Some(replication) = &request.replication else {
        bail!(
            ErrorKind::ValidationError,
            "Prepare write request has no replication settings"
        );
    };

    let settings: ReplicationSettings = serde_json::from_str(&replication.settings_json)?;
    settings.validate()?;

    Ok(settings)
}

/// Reasons to drop the previous golden and version tables.
///
/// Later checks overwrite earlier ones, so a shape data version increase wins over a job data
/// version increase, which wins over a rename.
fn drop_reasons(
    previous: &ReplicationMetaData,
    previous_settings: &ReplicationSettings,
    request: &PrepareWriteRequest,
    settings: &ReplicationSettings,
) -> (Option<DropReason>, Option<DropReason>) {
    let mut golden = None;
    let mut version = None;

    if previous_settings.golden_table_name != settings.golden_table_name {
        golden = Some(DropReason::GoldenNameChanged);
    }

    if previous_settings.version_table_name != settings.version_table_name {
        version = Some(DropReason::VersionNameChanged);
    }

    let previous_versions = &previous.request.data_versions;
    let versions = &request.data_versions;
    if versions.job_data_version > previous_versions.job_data_version {
        golden = Some(DropReason::JobDataVersionChanged);
        version = Some(DropReason::JobDataVersionChanged);
    }

    if versions.shape_data_version > previous_versions.shape_data_version {
        golden = Some(DropReason::ShapeDataVersionChanged);
        version = Some(DropReason::ShapeDataVersionChanged);
    }

    (golden, version)
}

/// Brings the destination tables of a replication job in line with `request`.
///
/// On the first prepare-write of a job both tables are created. Later calls compare against
/// the stored metadata and drop the previous tables when they were renamed or their data
/// version increased, then make sure the current tables exist. The metadata row is written in
/// every case.
pub async fn reconcile_replication_job<F>(
    factory: &F,
    request: &PrepareWriteRequest,
) -> ConnectorResult<ReconcileOutcome>
where
    F: ConnectionFactory,
{
    let settings = replication_settings(request)?;
    let job_id = request.data_versions.job_id.as_str();

    let metadata_table = metadata_table();
    let golden = golden_table(&request.schema, &settings.golden_table_name);
    let version = version_table(&request.schema, &settings.version_table_name);

    info!(
        golden_table = %golden.table_name,
        version_table = %version.table_name,
        job_id,
        "reconciling replication job"
    );

    let previous = get_previous_metadata(factory, &metadata_table, job_id).await?;
    let metadata = ReplicationMetaData::for_request(request.clone());
    let mut outcome = ReconcileOutcome::default();

    match previous {
        None => {
            info!(job_id, "no previous metadata, creating tables");
            outcome.first_run = true;
        }
        Some(previous) => {
            let previous_settings = replication_settings(&previous.request)?;
            let (golden_reason, version_reason) =
                drop_reasons(&previous, &previous_settings, request, &settings);

            if let Some(reason) = golden_reason {
                info!(%reason, job_id, "dropping golden table");
                let previous_golden = table_from_schema(
                    &previous.request.schema,
                    &previous_settings.golden_table_name,
                );
                drop_table(factory, &previous_golden).await?;
            }

            if let Some(reason) = version_reason {
                info!(%reason, job_id, "dropping version table");
                let previous_version = table_from_schema(
                    &previous.request.schema,
                    &previous_settings.version_table_name,
                );
                drop_table(factory, &previous_version).await?;
            }

            outcome.golden_dropped = golden_reason;
            outcome.version_dropped = version_reason;
        }
    }

    ensure_table(factory, &golden).await?;
    ensure_table(factory, &version).await?;

    upsert_metadata(factory, &metadata_table, &metadata).await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::ReplicationWriteRequest;

    fn request(
        golden: &str,
        version: &str,
        job_version: i64,
        shape_version: i64,
    ) -> PrepareWriteRequest {
        let mut request = PrepareWriteRequest::default();
        request.replication = Some(ReplicationWriteRequest {
            settings_json: format!(
                r#"{{"GoldenTableName":"{golden}","VersionTableName":"{version}"}}"#
            ),
        });
        request.data_versions.job_id = "job".to_string();
        request.data_versions.job_data_version = job_version;
        request.data_versions.shape_data_version = shape_version;
        request
    }

    fn reasons(
        previous: PrepareWriteRequest,
        current: PrepareWriteRequest,
    ) -> (Option<DropReason>, Option<DropReason>) {
        let previous_settings = replication_settings(&previous).unwrap();
        let settings = replication_settings(&current).unwrap();
        let previous = ReplicationMetaData {
            request: previous,
            replicated_shape_id: String::new(),
            replicated_shape_name: String::new(),
            timestamp: Utc::now(),
        };

        drop_reasons(&previous, &previous_settings, &current, &settings)
    }

    #[test]
    fn unchanged_request_drops_nothing() {
        assert_eq!(reasons(request("G", "V", 1, 1), request("G", "V", 1, 1)), (None, None));
    }

    #[test]
    fn renames_apply_per_table() {
        assert_eq!(
            reasons(request("A", "V", 1, 1), request("B", "V", 1, 1)),
            (Some(DropReason::GoldenNameChanged), None)
        );
        assert_eq!(
            reasons(request("G", "A", 1, 1), request("G", "B", 1, 1)),
            (None, Some(DropReason::VersionNameChanged))
        );
    }

    #[test]
    fn shape_version_overrides_other_reasons() {
        assert_eq!(
            reasons(request("A", "V", 1, 1), request("B", "V", 2, 2)),
            (
                Some(DropReason::ShapeDataVersionChanged),
                Some(DropReason::ShapeDataVersionChanged)
            )
        );
        assert_eq!(
            reasons(request("A", "V", 1, 1), request("B", "V", 2, 1)),
            (
                Some(DropReason::JobDataVersionChanged),
                Some(DropReason::JobDataVersionChanged)
            )
        );
    }

    #[test]
    fn lower_data_version_does_not_drop() {
        assert_eq!(reasons(request("G", "V", 3, 3), request("G", "V", 2, 2)), (None, None));
    }

    #[test]
    fn missing_settings_are_rejected() {
        let err = replication_settings(&PrepareWriteRequest::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = replication_settings(&request("", "V", 0, 0)).unwrap_err();
        assert_eq!(err.message(), "The GoldenTableName property must be set");
    }

    #[test]
    fn drop_reasons_render_as_messages() {
        assert_eq!(DropReason::GoldenNameChanged.to_string(), "Golden record name changed");
        assert_eq!(
            DropReason::ShapeDataVersionChanged.to_string(),
            "Shape data version changed"
        );
    }
}
