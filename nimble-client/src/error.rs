//! Error types for the coordinator client

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// The coordinator call an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `POST /register_particle`
    AcquireTask,
    /// `POST /complete_task`
    SubmitCompletion,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AcquireTask => write!(f, "acquire task"),
            Operation::SubmitCompletion => write!(f, "submit completion"),
        }
    }
}

/// Errors that can occur when talking to the coordinator
#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-200 status, transport failure or timeout. Callers treat this as transient.
    #[error("Coordinator unavailable ({operation}): {message}")]
    CoordinatorUnavailable {
        operation: Operation,
        /// HTTP status, `None` when no response was received
        status: Option<u16>,
        message: String,
    },

    /// A 200 response whose body does not have the expected structure
    #[error("Malformed coordinator response ({operation}): {message}")]
    MalformedResponse { operation: Operation, message: String },

    /// An artifact file could not be read for upload
    #[error("Failed to read artifact file {}: {source}", .path.display())]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an unavailability error from a non-200 response
    pub fn unexpected_status(operation: Operation, status: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref().trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self::CoordinatorUnavailable {
            operation,
            status: Some(status),
            message,
        }
    }

    /// Create an unavailability error from a request that never got a response
    pub fn transport(operation: Operation, error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else {
            format!("request failed: {}", error)
        };
        Self::CoordinatorUnavailable {
            operation,
            status: None,
            message,
        }
    }

    /// Check if this is a coordinator unavailability error
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::CoordinatorUnavailable { .. })
    }

    /// HTTP status of the failed call, if the coordinator answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::CoordinatorUnavailable { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if the coordinator rejected the request (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status))
    }

    /// Check if the coordinator failed internally (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500)
    }
}
