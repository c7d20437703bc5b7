//! Validated identifier types for the bridge
//!
//! Operation ids travel to the worker and back, session and call ids
//! name the conversational request a completion must be routed to.
//! All string identifiers share the same validation rules:
//!
//! - Non-empty, at most 128 characters
//! - No leading or trailing whitespace
//! - Only alphanumeric characters, hyphens, underscores and dots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_ID_LEN: usize = 128;

/// Error type for ID validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdValidationError {
    /// The ID string is empty
    Empty,
    /// The ID contains only whitespace
    WhitespaceOnly,
    /// The ID has leading or trailing whitespace
    LeadingTrailingWhitespace,
    /// The ID is longer than the allowed maximum
    TooLong { length: usize, max: usize },
    /// The ID contains invalid characters
    InvalidCharacters,
}

impl fmt::Display for IdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "ID cannot be empty"),
            Self::WhitespaceOnly => write!(f, "ID cannot be whitespace-only"),
            Self::LeadingTrailingWhitespace => {
                write!(f, "ID cannot have leading or trailing whitespace")
            }
            Self::TooLong { length, max } => {
                write!(f, "ID is {} characters long (max {})", length, max)
            }
            Self::InvalidCharacters => write!(
                f,
                "ID can only contain alphanumeric characters, hyphens, underscores, and dots"
            ),
        }
    }
}

impl std::error::Error for IdValidationError {}

fn validate(s: &str) -> Result<(), IdValidationError> {
    if s.is_empty() {
        return Err(IdValidationError::Empty);
    }
    if s.trim().is_empty() {
        return Err(IdValidationError::WhitespaceOnly);
    }
    if s != s.trim() {
        return Err(IdValidationError::LeadingTrailingWhitespace);
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdValidationError::TooLong {
            length: s.len(),
            max: MAX_ID_LEN,
        });
    }
    if !s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(IdValidationError::InvalidCharacters);
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier from a string
            pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let s = id.as_ref();
                validate(s)?;
                Ok(Self(s.to_string()))
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate(&value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of one dispatched worker operation.
    ///
    /// Generated by the gateway for every call and echoed back by the
    /// worker in acknowledgments and completion events.
    OperationId
);

string_id!(
    /// Identifier of one conversational session.
    SessionId
);

string_id!(
    /// Identifier of one tool call inside an agent turn.
    CallId
);

impl OperationId {
    /// Generate a fresh random operation id (`op-<uuid>`).
    pub fn generate() -> Self {
        Self(format!("op-{}", uuid::Uuid::new_v4().simple()))
    }

    /// Build the `op-<n>` id used by sequential generators.
    pub fn sequential(n: u64) -> Self {
        Self(format!("op-{}", n))
    }
}

impl CallId {
    /// Build the `call-<n>` id used for tool calls within a session.
    pub fn sequential(n: u64) -> Self {
        Self(format!("call-{}", n))
    }
}

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4().simple()))
    }
}

/// Index of an agent frame within a session.
///
/// Frames are the agent runs stacked by delegation: the root frame is the
/// coordinator, child frames are sub-agents it delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u64);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// The identity of the exact in-flight conversational request that a
/// completion must be routed back to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken {
    pub session_id: SessionId,
    pub frame_id: FrameId,
    pub call_id: CallId,
}

impl CorrelationToken {
    pub fn new(session_id: SessionId, frame_id: FrameId, call_id: CallId) -> Self {
        Self {
            session_id,
            frame_id,
            call_id,
        }
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.session_id, self.frame_id, self.call_id)
    }
}
