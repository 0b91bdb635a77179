//! Operation error taxonomy
//!
//! Every failure that crosses a component boundary (transport, retry executor,
//! tool registry, bridge) is an [`OperationError`]. The `kind` decides whether
//! the retry executor may try again; the recovery suggestion is the
//! plain-language hint a host shows next to the technical message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used at the edges where foreign errors enter the system
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Endpoint unreachable, reset, timed out or warming up (retried)
    Connection,
    /// Model, tool or function does not exist
    NotFound,
    /// Endpoint refused access
    Permission,
    /// Endpoint failed while processing the request
    ServerFault,
    /// Caller supplied something invalid, or the bridge refused the call
    Validation,
    /// Caller cancelled the operation
    Cancelled,
    /// Unclassified failure
    Unknown,
}

impl ErrorKind {
    /// Only connection failures are worth another attempt
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connection)
    }

    /// Default remediation shown to users for this kind
    pub fn default_suggestion(self) -> &'static str {
        match self {
            ErrorKind::Connection => {
                "Start the model endpoint and check the endpoint address in the bridge configuration."
            }
            ErrorKind::NotFound => {
                "Check the model id and the tool name; pull the model if it is not installed."
            }
            ErrorKind::Permission => "Check that this machine is allowed to use the endpoint.",
            ErrorKind::ServerFault => {
                "Inspect the endpoint logs; the server failed while handling the request."
            }
            ErrorKind::Validation => "Check the request and the bridge configuration.",
            ErrorKind::Cancelled => "The request was cancelled; send it again to continue.",
            ErrorKind::Unknown => "Try again later; if the problem persists, check the logs.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Permission => "permission",
            ErrorKind::ServerFault => "server_fault",
            ErrorKind::Validation => "validation",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with a user-actionable recovery suggestion
#[derive(Error, Debug)]
#[error("{kind} error: {message}")]
pub struct OperationError {
    kind: ErrorKind,
    message: String,
    recovery_suggestion: String,
    retryable: bool,
    #[source]
    cause: Option<BoxError>,
}

pub type OperationResult<T> = Result<T, OperationError>;

impl OperationError {
    /// Create an error with the kind's default recovery suggestion
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recovery_suggestion: kind.default_suggestion().to_string(),
            retryable: kind.is_retryable(),
            cause: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn server_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerFault, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Replace the recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestion = suggestion.into();
        self
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Prefix the message with what was being attempted
    pub fn context(mut self, context: impl AsRef<str>) -> Self {
        self.message = format!("{}: {}", context.as_ref(), self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn recovery_suggestion(&self) -> &str {
        &self.recovery_suggestion
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Classify an arbitrary error.
    ///
    /// An `OperationError` inside the box is returned as is. Transport and IO
    /// errors are mapped by their nature; anything else is `Unknown`.
    pub fn classify(error: BoxError) -> Self {
        let error = match error.downcast::<OperationError>() {
            Ok(op) => return *op,
            Err(other) => other,
        };
        let error = match error.downcast::<reqwest::Error>() {
            Ok(http) => return Self::from_reqwest(*http),
            Err(other) => other,
        };
        let error = match error.downcast::<std::io::Error>() {
            Ok(io) => return Self::from_io(*io),
            Err(other) => other,
        };
        match error.downcast::<serde_json::Error>() {
            Ok(json) => Self::server_fault(format!("malformed JSON: {}", json)).with_cause(json),
            Err(other) => Self::unknown(other.to_string()).with_cause(other),
        }
    }

    /// Map an HTTP status returned by the endpoint
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            format!("endpoint returned HTTP {}", status)
        } else {
            format!("endpoint returned HTTP {}: {}", status, body.trim())
        };
        match status {
            404 => Self::not_found(detail),
            401 | 403 => Self::permission(detail),
            408 | 429 | 502 | 503 | 504 => Self::connection(detail),
            500..=599 => Self::server_fault(detail),
            _ => Self::validation(detail),
        }
    }

    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_status(status.as_u16(), "").with_cause(error);
        }
        let kind = if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
            ErrorKind::Connection
        } else if error.is_decode() {
            ErrorKind::ServerFault
        } else if error.is_builder() {
            ErrorKind::Validation
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, error.to_string()).with_cause(error)
    }

    pub fn from_io(error: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match error.kind() {
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::TimedOut
            | Io::BrokenPipe
            | Io::UnexpectedEof => ErrorKind::Connection,
            Io::NotFound => ErrorKind::NotFound,
            Io::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, error.to_string()).with_cause(error)
    }
}
