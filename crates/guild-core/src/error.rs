//! Error types shared by the bridge and the conversation layer.

use std::time::Duration;
use thiserror::Error;

use crate::identifiers::{IdValidationError, OperationId};

/// Errors that can occur while dispatching and correlating worker operations.
#[derive(Debug, Error)]
pub enum GuildError {
    /// An identifier failed validation.
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] IdValidationError),

    /// The generated operation id is already pending.
    #[error("Operation {0} is already registered")]
    DuplicateOperation(OperationId),

    /// No pending operation with this id.
    #[error("Operation not found: {0}")]
    OperationNotFound(OperationId),

    /// The worker's acknowledgment for a long-running action was not a
    /// valid pending marker.
    #[error("Dispatch of {operation_id} failed: {reason}")]
    DispatchFailed {
        operation_id: OperationId,
        reason: String,
    },

    /// The bridge gave up waiting on the worker.
    #[error("Operation {operation_id} timed out after {after:?}")]
    Timeout {
        operation_id: OperationId,
        after: Duration,
    },

    /// The worker transport failed to carry a request or reply.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker replied with something we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Tool arguments did not match the action's schema.
    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    /// The tool or action name is unknown.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The completion queue has been closed.
    #[error("Completion queue closed")]
    QueueClosed,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuildError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GuildError::Transport(_) | GuildError::Timeout { .. })
    }

    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            GuildError::InvalidId(_) => "INVALID_ID",
            GuildError::DuplicateOperation(_) => "DUPLICATE_OPERATION",
            GuildError::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            GuildError::DispatchFailed { .. } => "DISPATCH_FAILED",
            GuildError::Timeout { .. } => "BRIDGE_TIMEOUT",
            GuildError::Transport(_) => "TRANSPORT_ERROR",
            GuildError::InvalidResponse(_) => "INVALID_RESPONSE",
            GuildError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            GuildError::UnknownAction(_) => "UNKNOWN_ACTION",
            GuildError::QueueClosed => "QUEUE_CLOSED",
            GuildError::Serialization(_) => "SERIALIZATION_ERROR",
            GuildError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for bridge operations.
pub type GuildResult<T> = Result<T, GuildError>;

impl From<serde_json::Error> for GuildError {
    fn from(err: serde_json::Error) -> Self {
        GuildError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for GuildError {
    fn from(err: std::io::Error) -> Self {
        GuildError::Transport(format!("IO error: {}", err))
    }
}
