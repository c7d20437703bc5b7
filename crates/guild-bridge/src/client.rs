//! Bridge client
//!
//! Owns everything one conversation needs to talk to one worker: the
//! registry, the completion queue, the transport handle and the config.

use guild_core::{GuildError, GuildResult};
use std::sync::Arc;
use tracing::info;

use crate::config::BridgeConfig;
use crate::dispatcher::ResultDispatcher;
use crate::gateway::InvocationGateway;
use crate::queue::{CompletionReceiver, CompletionSink, completion_queue};
use crate::registry::OperationRegistry;
use crate::transport::WorkerTransport;

pub struct BridgeClient {
    config: BridgeConfig,
    registry: Arc<OperationRegistry>,
    gateway: InvocationGateway,
    sink: CompletionSink,
    receiver: Option<CompletionReceiver>,
}

impl BridgeClient {
    /// Wire a transport into a fresh registry and completion queue.
    pub fn new(transport: Arc<dyn WorkerTransport>, config: BridgeConfig) -> Self {
        let registry = Arc::new(OperationRegistry::new());
        let (sink, receiver) = completion_queue(config.queue_warn_depth);
        transport.subscribe(sink.clone());
        let gateway = InvocationGateway::new(transport, Arc::clone(&registry), &config);

        info!(
            bridge_timeout_secs = config.bridge_timeout.as_secs(),
            ack_timeout_secs = config.ack_timeout.as_secs(),
            operation_ids = %config.operation_ids,
            "Bridge client ready"
        );

        Self {
            config,
            registry,
            gateway,
            sink,
            receiver: Some(receiver),
        }
    }

    pub fn gateway(&self) -> InvocationGateway {
        self.gateway.clone()
    }

    /// A producer handle on the completion queue, e.g. for the shutdown
    /// sentinel.
    pub fn completion_sink(&self) -> CompletionSink {
        self.sink.clone()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Hand out the single dispatcher for this client.
    ///
    /// # Errors
    ///
    /// Fails if the dispatcher was already taken.
    pub fn take_dispatcher(&mut self) -> GuildResult<ResultDispatcher> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| GuildError::Internal("dispatcher already taken".to_string()))?;
        Ok(ResultDispatcher::new(receiver, Arc::clone(&self.registry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WorkerRequest;
    use async_trait::async_trait;
    use guild_core::{CompletionEvent, OperationId, QueueItem};
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SinkHolder {
        sink: Mutex<Option<CompletionSink>>,
    }

    #[async_trait]
    impl WorkerTransport for SinkHolder {
        async fn dispatch(&self, _request: WorkerRequest) -> GuildResult<Value> {
            Err(GuildError::Transport("not connected".into()))
        }

        fn subscribe(&self, sink: CompletionSink) {
            *self.sink.lock().unwrap() = Some(sink);
        }
    }

    #[tokio::test]
    async fn test_transport_is_subscribed_to_the_queue() {
        let transport = Arc::new(SinkHolder::default());
        let mut client = BridgeClient::new(transport.clone(), BridgeConfig::default());

        let sink = transport.sink.lock().unwrap().clone().unwrap();
        sink.post(CompletionEvent::success(OperationId::sequential(1)))
            .unwrap();

        let dispatcher = client.take_dispatcher().unwrap();
        assert!(client.take_dispatcher().is_err());
        let mut receiver = dispatcher.into_receiver();
        assert!(matches!(receiver.try_recv(), Some(QueueItem::Completion(_))));
    }
}
