use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{FirebirdConnectionConfig, ValidationError};

/// Number of sample rows attached to each discovered schema when not overridden.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Root configuration of the connector process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorConfig {
    pub connection: FirebirdConnectionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config for ConnectorConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;
        self.discovery.validate()
    }
}

/// Discovery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiscoveryConfig {
    /// Maximum number of rows read into each schema's sample.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sample_size == 0 {
            return Err(ValidationError::SampleSizeZero);
        }

        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}
