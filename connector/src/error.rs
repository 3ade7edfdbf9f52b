//! Error types and result definitions for connector operations.
//!
//! [`ConnectorError`] carries a classification, a static description, optional dynamic detail
//! and the callsite it was raised at. Several errors can be aggregated into one, which is how
//! a failed metadata upsert reports both of its attempts.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use config::shared::ValidationError;
use firebird::DriverError;
use firebird::error::gds;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for connector operations.
#[derive(Debug, Clone)]
pub struct ConnectorError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<ConnectorError>,
        location: &'static Location<'static>,
    },
}

/// Classification of connector failures, grouped by area.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    SourceConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,

    // Schema & Mapping Errors
    SourceSchemaError,
    InvalidSchemaId,

    // Data & Transformation Errors
    ConversionError,
    InvalidData,
    ConstraintViolation,
    ValidationError,

    // Configuration Errors
    ConfigError,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // Security & Authentication Errors
    AuthenticationError,
    PermissionDenied,

    // State & Workflow Errors
    InvalidState,
    WriteNotPrepared,

    // Replication Errors
    MetadataUpsertFailed,

    // Unknown / Uncategorized
    Unknown,
}

impl ConnectorError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description, or `None` for aggregated errors.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the dynamic detail, or the first detail found among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the errors held by an aggregated error. A single error yields itself.
    pub fn errors(&self) -> Vec<&ConnectorError> {
        match self.repr {
            ErrorRepr::Single(_) => vec![self],
            ErrorRepr::Many { ref errors, .. } => errors.iter().collect(),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Short message for the host: the native detail when there is one, else the description.
    ///
    /// Used for per-record acknowledgements, which should not carry callsites or backtraces.
    pub fn message(&self) -> String {
        match self.repr {
            ErrorRepr::Single(ref payload) => match payload.detail.as_deref() {
                Some(detail) if !detail.trim().is_empty() => detail.to_string(),
                _ => payload.description.to_string(),
            },
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .map(ConnectorError::message)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ConnectorError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for ConnectorError {
    fn eq(&self, other: &ConnectorError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f)
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for ConnectorError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    if detail.trim().is_empty() {
        return write!(f, "\n  Detail: <empty>");
    }

    write!(f, "\n  Detail:")?;
    for line in detail.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

impl From<(ErrorKind, &'static str)> for ConnectorError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ConnectorError {
        ConnectorError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for ConnectorError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ConnectorError {
        ConnectorError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A vector holding exactly one error yields that error unwrapped.
impl<E> From<Vec<E>> for ConnectorError
where
    E: Into<ConnectorError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> ConnectorError {
        let location = Location::caller();
        let mut errors: Vec<ConnectorError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        ConnectorError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Classifies driver failures by their GDS status code.
///
/// Without a code the stage of the failure decides: connection stage errors are connection
/// failures, everything else a query failure. The native message is kept as detail.
impl From<DriverError> for ConnectorError {
    #[track_caller]
    fn from(err: DriverError) -> ConnectorError {
        let (kind, description) = match err.gds_code() {
            Some(gds::NETWORK_ERROR) | Some(gds::IO_ERROR) => (
                ErrorKind::SourceConnectionFailed,
                "Firebird connection failed",
            ),
            Some(gds::LOGIN) => (
                ErrorKind::AuthenticationError,
                "Firebird authentication failed",
            ),
            Some(gds::NO_PRIV) => (ErrorKind::PermissionDenied, "Firebird permission denied"),
            Some(gds::UNIQUE_KEY_VIOLATION)
            | Some(gds::NO_DUP)
            | Some(gds::FOREIGN_KEY)
            | Some(gds::NOT_VALID) => (
                ErrorKind::ConstraintViolation,
                "Firebird constraint violation",
            ),
            Some(gds::TABLE_UNKNOWN) | Some(gds::COLUMN_UNKNOWN) => (
                ErrorKind::SourceSchemaError,
                "Firebird schema object not found",
            ),
            Some(gds::NO_META_UPDATE) => (
                ErrorKind::SourceSchemaError,
                "Firebird metadata update failed",
            ),
            Some(_) => (ErrorKind::SourceQueryFailed, "Firebird query failed"),
            None => match err.kind() {
                firebird::DriverErrorKind::Connection => (
                    ErrorKind::SourceConnectionFailed,
                    "Firebird connection failed",
                ),
                firebird::DriverErrorKind::Query | firebird::DriverErrorKind::Fetch => {
                    (ErrorKind::SourceQueryFailed, "Firebird query failed")
                }
            },
        };

        let detail = err.message().to_string();
        ConnectorError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for ConnectorError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ConnectorError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        ConnectorError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for ConnectorError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> ConnectorError {
        let detail = err.to_string();
        ConnectorError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<std::num::ParseIntError> for ConnectorError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> ConnectorError {
        let detail = err.to_string();
        ConnectorError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<bigdecimal::ParseBigDecimalError> for ConnectorError {
    #[track_caller]
    fn from(err: bigdecimal::ParseBigDecimalError) -> ConnectorError {
        let detail = err.to_string();
        ConnectorError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Numeric parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<base64::DecodeError> for ConnectorError {
    #[track_caller]
    fn from(err: base64::DecodeError) -> ConnectorError {
        let detail = err.to_string();
        ConnectorError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Base64 decoding failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Settings validation errors keep their message verbatim as detail.
impl From<ValidationError> for ConnectorError {
    #[track_caller]
    fn from(err: ValidationError) -> ConnectorError {
        let detail = err.to_string();
        ConnectorError::from_components(
            ErrorKind::ValidationError,
            Cow::Borrowed("Invalid settings"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
