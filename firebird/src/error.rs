use std::fmt;

use thiserror::Error;

/// Firebird status codes (`isc_*`) the connector reacts to.
pub mod gds {
    /// `isc_network_error`: unable to complete network request to host.
    pub const NETWORK_ERROR: i64 = 335_544_721;
    /// `isc_io_error`: I/O error during a file operation, usually an unknown database path.
    pub const IO_ERROR: i64 = 335_544_344;
    /// `isc_login`: user name and password are not defined.
    pub const LOGIN: i64 = 335_544_472;
    /// `isc_no_priv`: no permission for the requested access.
    pub const NO_PRIV: i64 = 335_544_352;
    /// `isc_unique_key_violation`: violation of a primary or unique key constraint.
    pub const UNIQUE_KEY_VIOLATION: i64 = 335_544_665;
    /// `isc_no_dup`: attempt to store a duplicate value in a unique index.
    pub const NO_DUP: i64 = 335_544_349;
    /// `isc_foreign_key`: violation of a foreign key constraint.
    pub const FOREIGN_KEY: i64 = 335_544_466;
    /// `isc_not_valid`: validation error for a column.
    pub const NOT_VALID: i64 = 335_544_347;
    /// `isc_dsql_relation_err`: table unknown.
    pub const TABLE_UNKNOWN: i64 = 335_544_580;
    /// `isc_dsql_field_err`: column unknown.
    pub const COLUMN_UNKNOWN: i64 = 335_544_578;
    /// `isc_no_meta_update`: unsuccessful metadata update.
    pub const NO_META_UPDATE: i64 = 335_544_351;
}

/// Stage at which a driver call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Opening or closing a connection.
    Connection,
    /// Preparing or running a statement.
    Query,
    /// Reading a row from an open cursor.
    Fetch,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverErrorKind::Connection => "connection",
            DriverErrorKind::Query => "query",
            DriverErrorKind::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// Error reported by a driver implementation of the executor traits.
///
/// The native message is kept unchanged so it can be surfaced to the host.
#[derive(Debug, Clone, Error)]
#[error("Firebird {kind} error: {message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    gds_code: Option<i64>,
    message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            gds_code: None,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Connection, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Query, message)
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Fetch, message)
    }

    /// Attaches the primary GDS status code of the failure.
    pub fn with_gds_code(mut self, gds_code: i64) -> Self {
        self.gds_code = Some(gds_code);
        self
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn gds_code(&self) -> Option<i64> {
        self.gds_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
