//! Worker transport abstraction
//!
//! The worker is whatever actually drives the bot. The bridge only needs
//! two things from it: answer a request with an immediate reply, and push
//! completion events for long-running actions into a sink.

use async_trait::async_trait;
use guild_core::{Action, ActionKind, GuildResult, InvocationMode, OperationId};
use serde::Serialize;
use serde_json::Value;

use crate::queue::CompletionSink;

/// One request to the worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRequest {
    pub operation_id: OperationId,
    #[serde(serialize_with = "serialize_wire_name")]
    pub action: ActionKind,
    pub mode: InvocationMode,
    pub args: Value,
}

fn serialize_wire_name<S: serde::Serializer>(kind: &ActionKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.wire_name())
}

impl WorkerRequest {
    pub fn new(operation_id: OperationId, action: &Action) -> GuildResult<Self> {
        Ok(Self {
            operation_id,
            action: action.kind(),
            mode: action.mode(),
            args: action.args()?,
        })
    }
}

/// Connection to the automation worker.
///
/// `dispatch` returns the worker's immediate reply as raw JSON: the
/// terminal result for synchronous actions, the pending marker for
/// long-running ones. The gateway interprets it.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Send a request and wait for the worker's immediate reply.
    async fn dispatch(&self, request: WorkerRequest) -> GuildResult<Value>;

    /// Route out-of-band completion events into `sink`.
    fn subscribe(&self, sink: CompletionSink);
}
