//! Responses handed back to the conversation.
//!
//! `ActionResponse` is the loosely-typed shape the conversation sees: the
//! same fields for success and failure apart from `status` and `message`.
//! `ActionOutcome` is the typed view of the same response, with one payload
//! variant per action kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::{ActionKind, BlockLocation, ItemDetail};
use crate::identifiers::OperationId;

/// Status carried by every response.
///
/// Terminal statuses the bridge does not interpret itself, such as
/// `navigation_started`, are kept verbatim in `Other` so a synchronous
/// reply reaches the caller exactly as the worker sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    Pending,
    Success,
    Error,
    Other(String),
}

impl ResponseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
            ResponseStatus::Other(status) => status,
        }
    }
}

impl From<String> for ResponseStatus {
    fn from(status: String) -> Self {
        let known = match status.as_str() {
            "pending" => Some(ResponseStatus::Pending),
            "success" => Some(ResponseStatus::Success),
            "error" => Some(ResponseStatus::Error),
            _ => None,
        };
        known.unwrap_or(ResponseStatus::Other(status))
    }
}

impl From<ResponseStatus> for String {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

/// Structured response for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Action-specific fields (`collected_item`, `placed_location`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ActionResponse {
    /// The pending marker returned for long-running actions.
    pub fn pending(operation_id: OperationId) -> Self {
        Self {
            status: ResponseStatus::Pending,
            operation_id: Some(operation_id),
            message: None,
            fields: Map::new(),
        }
    }

    pub fn success(fields: Map<String, Value>) -> Self {
        Self {
            status: ResponseStatus::Success,
            operation_id: None,
            message: None,
            fields,
        }
    }

    pub fn error(operation_id: Option<OperationId>, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            operation_id,
            message: Some(message.into()),
            fields: Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ResponseStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// True when this is exactly the pending marker for `operation_id`.
    pub fn is_pending_for(&self, operation_id: &OperationId) -> bool {
        self.is_pending() && self.operation_id.as_ref() == Some(operation_id)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        // Only string keys and JSON values inside, serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Typed success payload, one variant per action kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Initialized { username: Option<String> },
    Moved,
    BlockFound { location: BlockLocation },
    Inventory { items: Vec<ItemDetail> },
    Mined { collected_item: Option<String> },
    Crafted {
        crafted_item: Option<String>,
        quantity_crafted: Option<u32>,
    },
    Placed { placed_location: Option<BlockLocation> },
}

/// Tagged outcome of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Pending(OperationId),
    Success(ActionPayload),
    Error(String),
}

fn field<T: serde::de::DeserializeOwned>(
    response: &ActionResponse,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    match response.fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some),
    }
}

impl ActionOutcome {
    /// Interpret a response for the given action kind.
    ///
    /// Fails when a success response is missing or mistypes a field the
    /// action requires.
    pub fn from_response(
        kind: ActionKind,
        response: &ActionResponse,
    ) -> Result<Self, serde_json::Error> {
        match &response.status {
            ResponseStatus::Error => Ok(ActionOutcome::Error(
                response
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
            ResponseStatus::Pending => match &response.operation_id {
                Some(id) => Ok(ActionOutcome::Pending(id.clone())),
                None => Err(serde::de::Error::missing_field("operation_id")),
            },
            // Any other terminal status is a non-error reply.
            ResponseStatus::Success | ResponseStatus::Other(_) => {
                let payload = match kind {
                    ActionKind::InitializeBot => ActionPayload::Initialized {
                        username: field(response, "username")?,
                    },
                    ActionKind::MoveTo => ActionPayload::Moved,
                    ActionKind::FindBlock => ActionPayload::BlockFound {
                        location: field(response, "location")?
                            .ok_or_else(|| serde::de::Error::missing_field("location"))?,
                    },
                    ActionKind::ViewInventory => ActionPayload::Inventory {
                        items: field(response, "inventory")?.unwrap_or_default(),
                    },
                    ActionKind::MineBlock => ActionPayload::Mined {
                        collected_item: field(response, "collected_item")?,
                    },
                    ActionKind::CraftItem => ActionPayload::Crafted {
                        crafted_item: field(response, "crafted_item")?,
                        quantity_crafted: field(response, "quantity_crafted")?,
                    },
                    ActionKind::PlaceBlock => ActionPayload::Placed {
                        placed_location: field(response, "placed_location")?,
                    },
                };
                Ok(ActionOutcome::Success(payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_marker_shape() {
        let marker = ActionResponse::pending(OperationId::parse("op-1").unwrap());
        assert_eq!(
            marker.to_value(),
            json!({"status": "pending", "operation_id": "op-1"})
        );
        assert!(marker.is_pending_for(&OperationId::parse("op-1").unwrap()));
        assert!(!marker.is_pending_for(&OperationId::parse("op-2").unwrap()));
    }

    #[test]
    fn test_error_and_success_share_shape() {
        let ok =
            ActionResponse::from_value(json!({"status": "success", "collected_item": "oak_log"}))
                .unwrap();
        let err = ActionResponse::from_value(json!({"status": "error", "message": "no tool"}))
            .unwrap();
        assert_eq!(ok.field("collected_item"), Some(&json!("oak_log")));
        assert!(err.is_error());
        assert_eq!(err.message.as_deref(), Some("no tool"));
    }

    #[test]
    fn test_worker_statuses_kept_verbatim() {
        let reply = json!({"status": "already_initialized", "username": "bot"});
        let resp = ActionResponse::from_value(reply.clone()).unwrap();
        assert_eq!(resp.status, ResponseStatus::Other("already_initialized".into()));
        assert_eq!(resp.to_value(), reply);
        assert!(!resp.is_error());
        assert_eq!(
            ActionOutcome::from_response(ActionKind::InitializeBot, &resp).unwrap(),
            ActionOutcome::Success(ActionPayload::Initialized {
                username: Some("bot".into())
            })
        );
    }

    #[test]
    fn test_missing_status_rejected() {
        assert!(ActionResponse::from_value(json!({"detail": 1})).is_err());
    }

    #[test]
    fn test_typed_outcome() {
        let resp = ActionResponse::from_value(json!({
            "status": "success",
            "crafted_item": "stick",
            "quantity_crafted": 4
        }))
        .unwrap();
        assert_eq!(
            ActionOutcome::from_response(ActionKind::CraftItem, &resp).unwrap(),
            ActionOutcome::Success(ActionPayload::Crafted {
                crafted_item: Some("stick".into()),
                quantity_crafted: Some(4),
            })
        );
    }

    #[test]
    fn test_find_block_requires_location() {
        let resp = ActionResponse::from_value(json!({"status": "success"})).unwrap();
        assert!(ActionOutcome::from_response(ActionKind::FindBlock, &resp).is_err());
    }

    #[test]
    fn test_error_outcome() {
        let resp = ActionResponse::error(None, "Mining failed");
        assert_eq!(
            ActionOutcome::from_response(ActionKind::MineBlock, &resp).unwrap(),
            ActionOutcome::Error("Mining failed".into())
        );
    }
}
