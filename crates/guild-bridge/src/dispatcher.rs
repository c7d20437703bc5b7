//! Result dispatcher
//!
//! Single consumer of the completion queue. Items are handled one at a
//! time in arrival order, and the conversation's whole reaction to one
//! delivery finishes before the next item is taken.

use async_trait::async_trait;
use guild_core::{
    ActionResponse, CompletionEvent, CompletionStatus, CorrelationToken, GuildResult, OperationId,
    QueueItem,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::queue::CompletionReceiver;
use crate::registry::{Operation, OperationRegistry, OperationStatus};

/// A completion routed back to the tool call that started it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub token: CorrelationToken,
    pub operation: Operation,
    pub payload: ActionResponse,
}

impl Delivery {
    pub fn operation_id(&self) -> &OperationId {
        &self.operation.operation_id
    }
}

/// The conversation side of the pipeline.
///
/// `resume` re-enters the conversation as the response to the deferred
/// call named by the delivery's token and returns once the conversation
/// has finished reacting, including any further turns it decides to run.
#[async_trait]
pub trait ConversationLoop: Send {
    async fn resume(&mut self, delivery: Delivery) -> GuildResult<()>;
}

/// Why the dispatcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Sentinel,
    QueueClosed,
}

/// Summary of one dispatcher run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub malformed: usize,
    pub missed: usize,
    /// Deliveries the conversation failed to absorb.
    pub failed: usize,
    /// Operations still pending when the dispatcher stopped.
    pub orphaned: Vec<Operation>,
    pub stop_reason: StopReason,
}

impl DispatchReport {
    fn new() -> Self {
        Self {
            delivered: 0,
            malformed: 0,
            missed: 0,
            failed: 0,
            orphaned: Vec::new(),
            stop_reason: StopReason::Sentinel,
        }
    }
}

/// Correlates completion events and re-injects them into the conversation.
pub struct ResultDispatcher {
    receiver: CompletionReceiver,
    registry: Arc<OperationRegistry>,
}

impl ResultDispatcher {
    pub fn new(receiver: CompletionReceiver, registry: Arc<OperationRegistry>) -> Self {
        Self { receiver, registry }
    }

    /// Give up dispatching and return the raw queue.
    pub fn into_receiver(self) -> CompletionReceiver {
        self.receiver
    }

    /// Run until the shutdown sentinel arrives or every producer is gone.
    ///
    /// Items still queued behind the sentinel are never processed.
    pub async fn run<C>(mut self, conversation: &mut C) -> DispatchReport
    where
        C: ConversationLoop + ?Sized,
    {
        let mut report = DispatchReport::new();
        info!("Result dispatcher started");

        loop {
            match self.receiver.recv().await {
                Some(QueueItem::Shutdown) => {
                    info!(
                        unprocessed = self.receiver.depth(),
                        "Shutdown sentinel received"
                    );
                    report.stop_reason = StopReason::Sentinel;
                    break;
                }
                Some(QueueItem::Completion(event)) => {
                    self.handle(event, conversation, &mut report).await;
                }
                None => {
                    warn!("Completion queue closed without a shutdown sentinel");
                    report.stop_reason = StopReason::QueueClosed;
                    break;
                }
            }
        }

        report.orphaned = self.registry.orphan_all();
        for operation in &report.orphaned {
            warn!(
                operation_id = %operation.operation_id,
                action = %operation.action,
                token = %operation.correlation_token,
                "Operation abandoned at shutdown; its completion will not be delivered"
            );
        }
        info!(
            delivered = report.delivered,
            malformed = report.malformed,
            missed = report.missed,
            failed = report.failed,
            orphaned = report.orphaned.len(),
            "Result dispatcher stopped"
        );
        report
    }

    async fn handle<C>(
        &mut self,
        event: CompletionEvent,
        conversation: &mut C,
        report: &mut DispatchReport,
    ) where
        C: ConversationLoop + ?Sized,
    {
        let Some(operation_id) = event.operation_id.clone() else {
            warn!(event = ?event, "Malformed completion without an operation id; discarded");
            report.malformed += 1;
            return;
        };

        let operation = match self.registry.resolve(&operation_id) {
            Ok(operation) => operation,
            Err(_) => {
                warn!(operation_id = %operation_id, "Completion for unknown operation; discarded");
                report.missed += 1;
                return;
            }
        };

        let status = match event.status {
            CompletionStatus::Success => OperationStatus::Completed,
            CompletionStatus::Error => OperationStatus::Error,
        };
        let operation = operation.with_status(status);
        let delivery = Delivery {
            token: operation.correlation_token.clone(),
            operation,
            payload: event.into_payload(),
        };

        debug!(operation_id = %operation_id, token = %delivery.token, "Delivering completion");
        match conversation.resume(delivery).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                error!(
                    operation_id = %operation_id,
                    code = e.error_code(),
                    "Conversation failed to absorb completion: {}",
                    e
                );
                report.failed += 1;
            }
        }
    }
}
