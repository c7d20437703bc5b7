//! Invocation gateway
//!
//! The one place tool calls cross into the worker. Every call gets a fresh
//! operation id and comes back as an [`ActionResponse`]; failures are
//! reported in the response, never raised to the caller.
//!
//! Synchronous actions wait for the worker's terminal reply, bounded by the
//! bridge timeout. Long-running actions are registered first, then
//! dispatched, and the worker must acknowledge with the pending marker for
//! the same id. Registering before dispatching means a completion can
//! never overtake its own registry entry.

use dashmap::DashMap;
use guild_core::{
    Action, ActionResponse, CorrelationToken, GuildError, GuildResult, InvocationMode, OperationId,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, OperationIdStrategy};
use crate::registry::{Operation, OperationRegistry};
use crate::transport::{WorkerRequest, WorkerTransport};

/// Mints operation ids according to the configured strategy.
#[derive(Debug)]
pub struct OperationIds {
    strategy: OperationIdStrategy,
    counter: AtomicU64,
}

impl OperationIds {
    pub fn new(strategy: OperationIdStrategy) -> Self {
        Self {
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> OperationId {
        match self.strategy {
            OperationIdStrategy::Uuid => OperationId::generate(),
            OperationIdStrategy::Sequential => {
                OperationId::sequential(self.counter.fetch_add(1, Ordering::Relaxed) + 1)
            }
        }
    }
}

/// Removes a synchronous call from the in-flight map however the call ends.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<OperationId, Operation>,
    operation_id: OperationId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.operation_id);
    }
}

/// Dispatches actions to the worker. Cheap to clone.
#[derive(Clone)]
pub struct InvocationGateway {
    transport: Arc<dyn WorkerTransport>,
    registry: Arc<OperationRegistry>,
    ids: Arc<OperationIds>,
    in_flight: Arc<DashMap<OperationId, Operation>>,
    bridge_timeout: Duration,
    ack_timeout: Duration,
}

impl InvocationGateway {
    pub fn new(
        transport: Arc<dyn WorkerTransport>,
        registry: Arc<OperationRegistry>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            ids: Arc::new(OperationIds::new(config.operation_ids)),
            in_flight: Arc::new(DashMap::new()),
            bridge_timeout: config.bridge_timeout,
            ack_timeout: config.ack_timeout,
        }
    }

    /// Invoke `action` in its own mode.
    ///
    /// `token` identifies the tool call; it is only retained for
    /// long-running actions.
    pub async fn invoke(&self, action: &Action, token: &CorrelationToken) -> ActionResponse {
        match action.mode() {
            InvocationMode::Sync => self.invoke_sync(action, token).await,
            InvocationMode::Async => self.invoke_async(action, token).await,
        }
    }

    /// Dispatch and wait for the worker's terminal reply.
    ///
    /// The reply is returned as the worker sent it. A timeout, transport
    /// failure or unreadable reply becomes an error response carrying the
    /// operation id.
    pub async fn invoke_sync(&self, action: &Action, token: &CorrelationToken) -> ActionResponse {
        let operation_id = self.ids.next_id();
        self.in_flight.insert(
            operation_id.clone(),
            Operation::new(operation_id.clone(), token.clone(), action.kind()),
        );
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            operation_id: operation_id.clone(),
        };

        debug!(operation_id = %operation_id, action = %action, "Dispatching synchronous action");
        match self.call_sync(&operation_id, action).await {
            Ok(response) => {
                debug!(
                    operation_id = %operation_id,
                    status = response.status.as_str(),
                    "Synchronous action returned"
                );
                response
            }
            Err(e) => {
                warn!(
                    operation_id = %operation_id,
                    action = %action.kind(),
                    code = e.error_code(),
                    retryable = e.is_retryable(),
                    "Synchronous action failed: {}",
                    e
                );
                ActionResponse::error(Some(operation_id), e.to_string())
            }
        }
    }

    async fn call_sync(
        &self,
        operation_id: &OperationId,
        action: &Action,
    ) -> GuildResult<ActionResponse> {
        let request = WorkerRequest::new(operation_id.clone(), action)?;
        let reply = self
            .dispatch_within(operation_id, request, self.bridge_timeout)
            .await?;
        let response = ActionResponse::from_value(reply)
            .map_err(|e| GuildError::InvalidResponse(format!("unreadable worker reply: {e}")))?;
        if response.is_pending() {
            return Err(GuildError::InvalidResponse(format!(
                "worker deferred synchronous action {}",
                action.kind()
            )));
        }
        Ok(response)
    }

    /// Register, dispatch and return the pending marker.
    ///
    /// Any acknowledgment other than the pending marker for the same id
    /// rolls the registration back and returns an error response.
    pub async fn invoke_async(&self, action: &Action, token: &CorrelationToken) -> ActionResponse {
        let operation_id = self.ids.next_id();

        if let Err(e) = self
            .registry
            .register(operation_id.clone(), token.clone(), action.kind())
        {
            error!(operation_id = %operation_id, "Operation id collision: {}", e);
            return ActionResponse::error(Some(operation_id), e.to_string());
        }

        match self.dispatch_async(&operation_id, action).await {
            Ok(()) => {
                info!(
                    operation_id = %operation_id,
                    action = %action,
                    token = %token,
                    "Long-running action acknowledged"
                );
                ActionResponse::pending(operation_id)
            }
            Err(e) => {
                self.registry.rollback(&operation_id);
                warn!(
                    operation_id = %operation_id,
                    action = %action.kind(),
                    code = e.error_code(),
                    retryable = e.is_retryable(),
                    "Dispatch failed: {}",
                    e
                );
                ActionResponse::error(Some(operation_id), e.to_string())
            }
        }
    }

    async fn dispatch_async(&self, operation_id: &OperationId, action: &Action) -> GuildResult<()> {
        let request = WorkerRequest::new(operation_id.clone(), action)?;
        let reply = self
            .dispatch_within(operation_id, request, self.ack_timeout)
            .await?;
        let ack = ActionResponse::from_value(reply.clone()).map_err(|e| GuildError::DispatchFailed {
            operation_id: operation_id.clone(),
            reason: format!("unreadable acknowledgment {reply}: {e}"),
        })?;
        if ack.is_pending_for(operation_id) {
            return Ok(());
        }
        let reason = match (ack.is_error(), ack.message) {
            (true, Some(message)) => message,
            _ => format!("expected pending marker, got {reply}"),
        };
        Err(GuildError::DispatchFailed {
            operation_id: operation_id.clone(),
            reason,
        })
    }

    async fn dispatch_within(
        &self,
        operation_id: &OperationId,
        request: WorkerRequest,
        limit: Duration,
    ) -> GuildResult<Value> {
        match tokio::time::timeout(limit, self.transport.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => Err(GuildError::Timeout {
                operation_id: operation_id.clone(),
                after: limit,
            }),
        }
    }

    /// Synchronous calls currently waiting on the worker.
    pub fn in_flight(&self) -> Vec<Operation> {
        self.in_flight.iter().map(|e| e.value().clone()).collect()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfigBuilder;
    use crate::queue::CompletionSink;
    use async_trait::async_trait;
    use guild_core::{BlockLocation, CallId, FrameId, MineBlockArgs, SessionId};
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a fixed value, or echoes a pending marker for the
    /// request's own id when none is set.
    struct FixedWorker {
        reply: Option<Value>,
        delay: Duration,
        seen: Mutex<Vec<WorkerRequest>>,
    }

    impl FixedWorker {
        fn new(reply: Option<Value>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkerTransport for FixedWorker {
        async fn dispatch(&self, request: WorkerRequest) -> GuildResult<Value> {
            self.seen.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.reply.clone().unwrap_or_else(|| {
                json!({"status": "pending", "operation_id": request.operation_id})
            }))
        }

        fn subscribe(&self, _sink: CompletionSink) {}
    }

    fn gateway(worker: Arc<FixedWorker>, config: BridgeConfig) -> InvocationGateway {
        InvocationGateway::new(worker, Arc::new(OperationRegistry::new()), &config)
    }

    fn sequential() -> BridgeConfig {
        BridgeConfigBuilder::new()
            .operation_ids(OperationIdStrategy::Sequential)
            .build()
            .unwrap()
    }

    fn token() -> CorrelationToken {
        CorrelationToken::new(
            SessionId::parse("session-1").unwrap(),
            FrameId::ROOT,
            CallId::parse("caller-A").unwrap(),
        )
    }

    fn mine() -> Action {
        Action::MineBlock(MineBlockArgs {
            block_type: "oak_log".into(),
            at: BlockLocation::new(10, 64, 20),
        })
    }

    #[test]
    fn test_sequential_ids() {
        let ids = OperationIds::new(OperationIdStrategy::Sequential);
        assert_eq!(ids.next_id().as_str(), "op-1");
        assert_eq!(ids.next_id().as_str(), "op-2");
        let uuids = OperationIds::new(OperationIdStrategy::Uuid);
        assert_ne!(uuids.next_id(), uuids.next_id());
    }

    #[tokio::test]
    async fn test_async_registers_before_ack() {
        let worker = Arc::new(FixedWorker::new(None));
        let gateway = gateway(Arc::clone(&worker), sequential());

        let response = gateway.invoke(&mine(), &token()).await;
        let op = OperationId::sequential(1);
        assert!(response.is_pending_for(&op));
        assert_eq!(gateway.registry().len(), 1);
        assert_eq!(gateway.registry().get(&op).unwrap().correlation_token, token());
        assert_eq!(worker.seen.lock().unwrap()[0].operation_id, op);
    }

    #[tokio::test]
    async fn test_async_wrong_id_rolls_back() {
        let worker = Arc::new(FixedWorker::new(Some(
            json!({"status": "pending", "operation_id": "op-42"}),
        )));
        let gateway = gateway(worker, sequential());

        let response = gateway.invoke_async(&mine(), &token()).await;
        assert!(response.is_error());
        assert_eq!(response.operation_id, Some(OperationId::sequential(1)));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn test_async_error_ack_keeps_worker_message() {
        let worker = Arc::new(FixedWorker::new(Some(
            json!({"status": "error", "message": "Bot not initialized"}),
        )));
        let gateway = gateway(worker, sequential());

        let response = gateway.invoke_async(&mine(), &token()).await;
        assert!(response.message.unwrap().contains("Bot not initialized"));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn test_sync_reply_returned_unmodified() {
        let reply = json!({"status": "success", "location": {"x": 1, "y": 2, "z": 3}});
        let worker = Arc::new(FixedWorker::new(Some(reply.clone())));
        let gateway = gateway(worker, sequential());

        let action = Action::FindBlock(guild_core::FindBlockArgs {
            block_type: "oak_log".into(),
            max_distance: 32,
        });
        let response = gateway.invoke(&action, &token()).await;
        assert_eq!(response.to_value(), reply);
        assert!(gateway.registry().is_empty());
        assert!(gateway.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_sync_pending_reply_is_an_error() {
        let worker = Arc::new(FixedWorker::new(None));
        let gateway = gateway(worker, sequential());

        let response = gateway.invoke_sync(&Action::ViewInventory, &token()).await;
        assert!(response.is_error());
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_timeout_clears_in_flight() {
        let mut worker = FixedWorker::new(Some(json!({"status": "success"})));
        worker.delay = Duration::from_secs(5);
        let config = BridgeConfigBuilder::new()
            .operation_ids(OperationIdStrategy::Sequential)
            .bridge_timeout_secs(2)
            .ack_timeout_secs(1)
            .build()
            .unwrap();
        let gateway = gateway(Arc::new(worker), config);

        let response = gateway
            .invoke(&Action::MoveTo(BlockLocation::new(0, 64, 0)), &token())
            .await;
        assert!(response.is_error());
        assert_eq!(response.operation_id, Some(OperationId::sequential(1)));
        assert!(response.message.unwrap().contains("timed out"));
        assert!(gateway.in_flight().is_empty());
    }
}
