//! # Mock Worker
//!
//! A [`WorkerTransport`] that answers from a script instead of driving a
//! real bot, records every request, and lets tests emit completion events
//! whenever they like.

use async_trait::async_trait;
use guild_bridge::{CompletionSink, WorkerRequest, WorkerTransport};
use guild_core::{
    ActionKind, CompletionEvent, GuildError, GuildResult, InvocationMode, OperationId,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Completion emitted automatically right after a long-running action is
/// acknowledged.
#[derive(Debug, Clone)]
enum AutoCompletion {
    Success(Value),
    Failure(String),
}

/// Scripted stand-in for the automation worker.
///
/// Unscripted synchronous actions reply `{"status": "success"}`;
/// unscripted long-running actions acknowledge with the pending marker
/// for the request's own operation id.
#[derive(Debug, Clone, Default)]
pub struct MockWorker {
    defaults: Arc<Mutex<HashMap<ActionKind, Value>>>,
    queued: Arc<Mutex<HashMap<ActionKind, VecDeque<Value>>>>,
    delays: Arc<Mutex<HashMap<ActionKind, Duration>>>,
    auto: Arc<Mutex<HashMap<ActionKind, AutoCompletion>>>,
    sink: Arc<Mutex<Option<CompletionSink>>>,
    history: Arc<Mutex<Vec<WorkerRequest>>>,
}

impl MockWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` every time `kind` is dispatched.
    ///
    /// For long-running actions this replaces the acknowledgment.
    pub fn with_reply(self, kind: ActionKind, reply: Value) -> Self {
        self.defaults.lock().unwrap().insert(kind, reply);
        self
    }

    /// Reply with `reply` the next time `kind` is dispatched, ahead of any
    /// default.
    pub fn with_next_reply(self, kind: ActionKind, reply: Value) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(reply);
        self
    }

    /// Hold every reply for `kind` back by `delay`.
    pub fn with_delay(self, kind: ActionKind, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(kind, delay);
        self
    }

    /// After acknowledging `kind`, immediately complete it successfully
    /// with `fields`.
    pub fn auto_complete(self, kind: ActionKind, fields: Value) -> Self {
        self.auto
            .lock()
            .unwrap()
            .insert(kind, AutoCompletion::Success(fields));
        self
    }

    /// After acknowledging `kind`, immediately fail it with `message`.
    pub fn auto_fail(self, kind: ActionKind, message: impl Into<String>) -> Self {
        self.auto
            .lock()
            .unwrap()
            .insert(kind, AutoCompletion::Failure(message.into()));
        self
    }

    /// Emit a completion event through the subscribed sink.
    pub fn complete(&self, event: CompletionEvent) -> GuildResult<()> {
        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GuildError::Internal("mock worker has no subscriber".to_string()))?;
        sink.post(event)
    }

    /// Emit a success completion for `operation_id` carrying `fields`.
    pub fn complete_success(&self, operation_id: &OperationId, fields: Value) -> GuildResult<()> {
        self.complete(with_fields(CompletionEvent::success(operation_id.clone()), fields))
    }

    /// Emit an error completion for `operation_id`.
    pub fn complete_error(
        &self,
        operation_id: &OperationId,
        message: impl Into<String>,
    ) -> GuildResult<()> {
        self.complete(CompletionEvent::error(operation_id.clone(), message))
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.history.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    pub fn requests_for(&self, kind: ActionKind) -> Vec<WorkerRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.action == kind)
            .collect()
    }

    /// Operation id of the most recent request for `kind`.
    pub fn last_operation_id(&self, kind: ActionKind) -> Option<OperationId> {
        self.requests_for(kind).pop().map(|r| r.operation_id)
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    fn scripted_reply(&self, request: &WorkerRequest) -> Value {
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&request.action)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }
        if let Some(reply) = self.defaults.lock().unwrap().get(&request.action) {
            return reply.clone();
        }
        match request.mode {
            InvocationMode::Sync => json!({"status": "success"}),
            InvocationMode::Async => {
                json!({"status": "pending", "operation_id": request.operation_id})
            }
        }
    }
}

fn with_fields(mut event: CompletionEvent, fields: Value) -> CompletionEvent {
    if let Value::Object(map) = fields {
        event.fields.extend(map);
    }
    event
}

#[async_trait]
impl WorkerTransport for MockWorker {
    async fn dispatch(&self, request: WorkerRequest) -> GuildResult<Value> {
        debug!(
            operation_id = %request.operation_id,
            action = %request.action,
            "Mock worker received request"
        );
        self.history.lock().unwrap().push(request.clone());

        let delay = self.delays.lock().unwrap().get(&request.action).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.scripted_reply(&request);
        let acknowledged = reply.get("status").and_then(Value::as_str) == Some("pending");

        if request.mode == InvocationMode::Async && acknowledged {
            let auto = self.auto.lock().unwrap().get(&request.action).cloned();
            match auto {
                Some(AutoCompletion::Success(fields)) => {
                    self.complete_success(&request.operation_id, fields)?
                }
                Some(AutoCompletion::Failure(message)) => {
                    self.complete_error(&request.operation_id, message)?
                }
                None => {}
            }
        }

        Ok(reply)
    }

    fn subscribe(&self, sink: CompletionSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_bridge::completion_queue;
    use guild_core::{Action, QueueItem};

    fn request(n: u64, action: &Action) -> WorkerRequest {
        WorkerRequest::new(OperationId::sequential(n), action).unwrap()
    }

    #[tokio::test]
    async fn test_default_replies() {
        let worker = MockWorker::new();
        let sync = worker
            .dispatch(request(1, &Action::ViewInventory))
            .await
            .unwrap();
        assert_eq!(sync, json!({"status": "success"}));

        let mine = Action::from_args(
            ActionKind::MineBlock,
            json!({"block_type": "oak_log", "x": 1, "y": 2, "z": 3}),
        )
        .unwrap();
        let ack = worker.dispatch(request(2, &mine)).await.unwrap();
        assert_eq!(ack, json!({"status": "pending", "operation_id": "op-2"}));
        assert_eq!(worker.call_count(), 2);
        assert_eq!(
            worker.last_operation_id(ActionKind::MineBlock),
            Some(OperationId::sequential(2))
        );
    }

    #[test]
    fn test_next_reply_takes_precedence() {
        let worker = MockWorker::new()
            .with_reply(ActionKind::ViewInventory, json!({"status": "success", "inventory": []}))
            .with_next_reply(
                ActionKind::ViewInventory,
                json!({"status": "error", "message": "busy"}),
            );

        let (first, second) = tokio_test::block_on(async {
            let first = worker.dispatch(request(1, &Action::ViewInventory)).await;
            let second = worker.dispatch(request(2, &Action::ViewInventory)).await;
            (first.unwrap(), second.unwrap())
        });
        assert_eq!(first["status"], "error");
        assert_eq!(second["status"], "success");
    }

    #[tokio::test]
    async fn test_auto_complete_posts_after_ack() {
        let (sink, mut receiver) = completion_queue(8);
        let worker = MockWorker::new().auto_complete(
            ActionKind::MineBlock,
            json!({"collected_item": "oak_log"}),
        );
        worker.subscribe(sink);

        let mine = Action::from_args(
            ActionKind::MineBlock,
            json!({"block_type": "oak_log", "x": 1, "y": 2, "z": 3}),
        )
        .unwrap();
        worker.dispatch(request(5, &mine)).await.unwrap();

        let Some(QueueItem::Completion(event)) = receiver.try_recv() else {
            panic!("expected a completion");
        };
        assert_eq!(event.operation_id, Some(OperationId::sequential(5)));
        assert_eq!(event.fields["collected_item"], "oak_log");
    }

    #[test]
    fn test_complete_without_subscriber() {
        let worker = MockWorker::new();
        assert!(!worker.is_subscribed());
        assert!(
            worker
                .complete_success(&OperationId::sequential(1), json!({}))
                .is_err()
        );
    }
}
