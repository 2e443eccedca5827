use reqwest::StatusCode;
use thiserror::Error;

use crate::Response;

/// Every way a request issued through a [`FetchController`](crate::FetchController) can fail.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// Network or HTTP failure reported by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request was aborted by a newer request, [`cancel`](crate::FetchController::cancel), or teardown.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The response body did not match the registered schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Anything else, usually raised by a user interceptor.
    #[error("{0}")]
    Unknown(String),
}

impl FetchError {
    /// Wraps an arbitrary failure.
    pub fn unknown(message: impl std::fmt::Display) -> Self {
        FetchError::Unknown(message.to_string())
    }

    /// Whether this error is a cancellation.
    pub fn is_cancel(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }

    /// Whether this error came from the transport.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    /// Whether this error is a schema validation failure.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, FetchError::Validation(_))
    }

    /// The response attached to this error, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Transport(error) => error.response.as_deref(),
            FetchError::Validation(error) => Some(error.response.as_ref()),
            FetchError::Cancelled(_) | FetchError::Unknown(_) => None,
        }
    }
}

/// Returns `true` if `error` is a cancellation.
pub fn is_cancel(error: &FetchError) -> bool {
    error.is_cancel()
}

/// Returns `true` if `error` was raised by the transport.
pub fn is_transport_error(error: &FetchError) -> bool {
    error.is_transport_error()
}

/// Returns `true` if `error` is a schema validation failure.
pub fn is_validation_error(error: &FetchError) -> bool {
    error.is_validation_error()
}

/// What went wrong at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request could not be built (bad url, bad header).
    Request,
    /// The request never produced a response.
    Network,
    /// The server answered with a non-success status.
    Status,
    /// The response body could not be read.
    Decode,
}

/// A network or HTTP failure.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human readable description.
    pub message: String,
    /// HTTP status, when the server answered.
    pub status: Option<StatusCode>,
    /// The full response, when the server answered.
    pub response: Option<Box<Response>>,
}

impl TransportError {
    /// Creates an error without an attached response.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            response: None,
        }
    }

    /// Creates a [`TransportErrorKind::Status`] error for a non-success response.
    pub fn status(response: Response) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            message: format!("Request failed with status code {}", response.status.as_u16()),
            status: Some(response.status),
            response: Some(Box::new(response)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_builder() {
            TransportErrorKind::Request
        } else if error.is_decode() || error.is_body() {
            TransportErrorKind::Decode
        } else if error.is_status() {
            TransportErrorKind::Status
        } else {
            TransportErrorKind::Network
        };

        Self {
            kind,
            message: error.to_string(),
            status: error.status(),
            response: None,
        }
    }
}

impl From<TransportErrorKind> for TransportError {
    fn from(kind: TransportErrorKind) -> Self {
        let message = match kind {
            TransportErrorKind::Request => "invalid request",
            TransportErrorKind::Network => "network error",
            TransportErrorKind::Status => "unexpected status",
            TransportErrorKind::Decode => "failed to read response body",
        };
        TransportError::new(kind, message)
    }
}

/// Raised when an in-flight request is aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request cancelled: {reason}")]
pub struct Cancelled {
    /// Why the request was aborted.
    pub reason: String,
}

impl Cancelled {
    /// Creates a cancellation with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the offending value, when known.
    pub path: Option<String>,
    /// What is wrong with it.
    pub message: String,
}

/// A response body that failed schema validation.
#[derive(Error, Debug, Clone)]
#[error("{name}: {message}")]
pub struct ValidationError {
    /// Kind of validation failure reported by the schema.
    pub name: String,
    /// Summary of the failure.
    pub message: String,
    /// Individual violations.
    pub issues: Vec<ValidationIssue>,
    /// The response that failed validation, body untouched.
    pub response: Box<Response>,
}
