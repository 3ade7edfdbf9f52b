use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::shared::ValidationError;

/// Replication target chosen by the user in the host's replication form.
///
/// Serialized with the form's field names, since the host stores this payload verbatim as
/// the replication settings JSON of a prepare-write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicationSettings {
    /// Name of the golden record table.
    #[serde(default)]
    pub golden_table_name: String,
    /// Name of the version record table.
    #[serde(default)]
    pub version_table_name: String,
}

impl ReplicationSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.golden_table_name.trim().is_empty() {
            return Err(ValidationError::MissingReplicationSetting("GoldenTableName"));
        }

        if self.version_table_name.trim().is_empty() {
            return Err(ValidationError::MissingReplicationSetting("VersionTableName"));
        }

        Ok(())
    }
}

/// JSON schema of the replication form presented by the host.
pub fn replication_form_schema_json() -> String {
    json!({
        "type": "object",
        "properties": {
            "GoldenTableName": {
                "type": "string",
                "title": "Golden Record Table Name",
                "description": "Name for your golden record table in Firebird",
            },
            "VersionTableName": {
                "type": "string",
                "title": "Version Record Table Name",
                "description": "Name for your version record table in Firebird",
            },
        },
        "required": ["GoldenTableName", "VersionTableName"],
    })
    .to_string()
}

/// UI hints for the replication form.
pub fn replication_form_ui_json() -> String {
    json!({ "ui:order": ["GoldenTableName", "VersionTableName"] }).to_string()
}
