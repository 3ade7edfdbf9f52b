use thiserror::Error;

/// Configuration validation errors.
///
/// Messages are surfaced verbatim to the host, which may match on them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The Hostname property must be set")]
    MissingHostname,
    #[error("The Database property must be set")]
    MissingDatabase,
    #[error("The Username property must be set")]
    MissingUsername,
    #[error("The Password property must be set")]
    MissingPassword,
    /// Discovery sample size must be positive.
    #[error("`sample_size` cannot be zero")]
    SampleSizeZero,
    #[error("The {0} property must be set")]
    MissingReplicationSetting(&'static str),
}
