//! Out-of-band completion events emitted by the worker.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::OperationId;
use crate::outcome::{ActionResponse, ResponseStatus};

/// Terminal status of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Success,
    Error,
}

impl From<CompletionStatus> for ResponseStatus {
    fn from(status: CompletionStatus) -> Self {
        match status {
            CompletionStatus::Success => ResponseStatus::Success,
            CompletionStatus::Error => ResponseStatus::Error,
        }
    }
}

/// Absent and unparseable ids both become `None`; the dispatcher
/// discards such events as malformed instead of failing the whole line.
fn lenient_operation_id<'de, D>(deserializer: D) -> Result<Option<OperationId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => OperationId::parse(s).ok(),
        _ => None,
    })
}

/// Notification that an operation finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    #[serde(
        default,
        deserialize_with = "lenient_operation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_id: Option<OperationId>,
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Action-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CompletionEvent {
    pub fn success(operation_id: OperationId) -> Self {
        Self {
            operation_id: Some(operation_id),
            status: CompletionStatus::Success,
            message: None,
            fields: Map::new(),
        }
    }

    pub fn error(operation_id: OperationId, message: impl Into<String>) -> Self {
        Self {
            operation_id: Some(operation_id),
            status: CompletionStatus::Error,
            message: Some(message.into()),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// The payload redelivered to the conversation: status, message and
    /// whichever action-specific fields the worker sent.
    pub fn into_payload(self) -> ActionResponse {
        ActionResponse {
            status: self.status.into(),
            operation_id: None,
            message: self.message,
            fields: self.fields,
        }
    }
}

/// One item on the completion queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Completion(CompletionEvent),
    /// Reserved sentinel requesting dispatcher termination.
    Shutdown,
}
