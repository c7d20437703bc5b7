//! Session error types.

use guild_core::{CallId, FrameId, GuildError, SessionId};
use thiserror::Error;

use crate::agent::AgentRole;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A delivery was addressed to another session.
    #[error("Delivery for session {0} reached the wrong session")]
    ForeignSession(SessionId),

    #[error("Unknown frame: {0}")]
    UnknownFrame(FrameId),

    /// The frame exists but is not waiting on this call.
    #[error("Frame {frame} has no open call {call}")]
    UnknownCall { frame: FrameId, call: CallId },

    #[error("Frame {0} already finished")]
    FrameFinished(FrameId),

    /// The session was already started.
    #[error("Session already started")]
    AlreadyStarted,

    #[error("Decision model failed for {role}: {message}")]
    Model { role: AgentRole, message: String },

    /// A decision plan could not be loaded.
    #[error("Invalid plan: {0}")]
    Plan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bridge(#[from] GuildError),
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::ForeignSession(_) => "FOREIGN_SESSION",
            SessionError::UnknownFrame(_) => "UNKNOWN_FRAME",
            SessionError::UnknownCall { .. } => "UNKNOWN_CALL",
            SessionError::FrameFinished(_) => "FRAME_FINISHED",
            SessionError::AlreadyStarted => "ALREADY_STARTED",
            SessionError::Model { .. } => "MODEL_ERROR",
            SessionError::Plan(_) => "INVALID_PLAN",
            SessionError::Io(_) => "IO_ERROR",
            SessionError::Bridge(e) => e.error_code(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Plan(err.to_string())
    }
}

impl From<SessionError> for GuildError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Bridge(inner) => inner,
            other => GuildError::Internal(other.to_string()),
        }
    }
}
