//! Error taxonomy shared by the repository, service, and transport layers.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

/// The four error kinds callers can rely on.
///
/// Every [`HuddleError`] collapses into exactly one kind. The kind is stable
/// across backends; the message is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed identifier or request payload.
    InvalidArgument,
    /// Referenced user, group, or token does not exist.
    NotFound,
    /// Authorization or membership-rule violation.
    PermissionDenied,
    /// Store, cache, or transaction failure, or detected data corruption.
    Internal,
}

impl ErrorKind {
    /// Returns the machine-readable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified error type for all layers of Huddle.
#[derive(Error, Debug)]
pub enum HuddleError {
    // ============ Caller Errors ============
    /// Malformed identifier or invalid request payload
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Authorization or membership-rule violation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ============ Infrastructure Errors ============
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Redis/Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Internal Errors ============
    /// Internal error, including detected data corruption
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HuddleError {
    /// Collapses this error into the caller-facing taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Database(_)
            | Self::Cache(_)
            | Self::Configuration(_)
            | Self::Timeout(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::Internal => 500,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.kind().code()
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument<T: Into<String>>(message: T) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a permission denied error.
    #[must_use]
    pub fn permission_denied<T: Into<String>>(message: T) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Prefixes infrastructure failures with the operation that produced them.
    ///
    /// Caller-facing kinds are returned unchanged so their messages stay short.
    #[must_use]
    pub fn context(self, operation: &str) -> Self {
        match self {
            Self::Database(msg) => Self::Database(format!("{operation}: {msg}")),
            Self::Cache(msg) => Self::Cache(format!("{operation}: {msg}")),
            Self::Timeout(msg) => Self::Timeout(format!("{operation}: {msg}")),
            Self::Internal(msg) => Self::Internal(format!("{operation}: {msg}")),
            Self::Other(err) => Self::Other(err.context(operation.to_string())),
            other => other,
        }
    }

    /// Checks if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cache(_) | Self::Timeout(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for HuddleError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for HuddleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<uuid::Error> for HuddleError {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidArgument(format!("malformed identifier: {}", err))
    }
}

/// Serializable error response for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level errors for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-level validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
}

impl ErrorResponse {
    /// Creates a new error response from a `HuddleError`.
    #[must_use]
    pub fn from_error(error: &HuddleError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }

    /// Sets field-level validation errors.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&HuddleError> for ErrorResponse {
    fn from(error: &HuddleError) -> Self {
        Self::from_error(error)
    }
}
