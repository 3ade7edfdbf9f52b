use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer, Serialize};

use crate::SerializableSecretString;
use crate::shared::ValidationError;

/// Default port of a Firebird server.
pub const DEFAULT_FIREBIRD_PORT: u16 = 3050;

/// Settings for connecting to a Firebird database.
///
/// Field names accept both the snake case used in configuration files and the Pascal case
/// settings payload sent by the host on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FirebirdConnectionConfig {
    /// Hostname or IP address of the Firebird server.
    #[serde(alias = "Hostname", default)]
    pub host: String,
    /// Port the server listens on.
    #[serde(
        alias = "Port",
        default = "default_port",
        deserialize_with = "deserialize_port"
    )]
    pub port: u16,
    /// Database path or alias on the server.
    #[serde(alias = "Database", default)]
    pub database: String,
    #[serde(alias = "Username", default)]
    pub username: String,
    /// Password for `username`. Redacted in debug output.
    #[serde(alias = "Password", default)]
    pub password: Option<SerializableSecretString>,
}

impl FirebirdConnectionConfig {
    /// Checks required fields in host, database, username, password order and reports the
    /// first one that is missing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingHostname);
        }

        if self.database.trim().is_empty() {
            return Err(ValidationError::MissingDatabase);
        }

        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingUsername);
        }

        match &self.password {
            Some(password) if !password.expose_secret().is_empty() => Ok(()),
            _ => Err(ValidationError::MissingPassword),
        }
    }

    /// Returns the driver connection string for the configured database.
    pub fn connection_string(&self) -> String {
        self.connection_string_for(&self.database)
    }

    /// Returns the driver connection string for an alternate database on the same server.
    pub fn connection_string_for(&self, database: &str) -> String {
        let password = self
            .password
            .as_ref()
            .map(|password| password.expose_secret().as_str())
            .unwrap_or_default();

        format!(
            "User={};Password={};Database={};Host={};Port={};",
            self.username, password, database, self.host, self.port
        )
    }
}

fn default_port() -> u16 {
    DEFAULT_FIREBIRD_PORT
}

/// Accepts the port as a number or as a (possibly empty) string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) if text.trim().is_empty() => Ok(DEFAULT_FIREBIRD_PORT),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
