//! Error taxonomy shared by the request pipeline and the sync operations

use crate::models::EntityId;
use thiserror::Error;

/// Message a download reports when the server has no file for the project
pub const NOT_UPLOADED_MESSAGE: &str = "Project not yet uploaded";

/// Normalized failure of one API call
///
/// Cloneable so a de-duplicated call can hand the same failure to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Non-2xx response carrying a status message
    #[error("{status_message}")]
    Http { status: u16, status_message: String },

    /// 404 response
    #[error("{status_message}")]
    NotFound { status_message: String },

    /// Binary error body could not be decoded into a status message
    #[error("Could not decode error response: {0}")]
    Decode(String),

    /// Successful response whose body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Uniform human-readable message for presentation
    pub fn status_message(&self) -> String {
        match self {
            ApiError::Http { status_message, .. } | ApiError::NotFound { status_message } => {
                status_message.clone()
            }
            other => other.to_string(),
        }
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Http { .. } => "http",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Decode(_) => "decode",
            ApiError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Failure of a sync operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{}", NOT_UPLOADED_MESSAGE)]
    NotUploaded,

    #[error("{kind} {id} is not loaded")]
    NotInStore { kind: &'static str, id: EntityId },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Could not encode request body: {0}")]
    Encode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn status_message(&self) -> String {
        match self {
            SyncError::Api(api) => api.status_message(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}
