//! Completion queue
//!
//! FIFO of completion events produced by the worker and consumed by the
//! dispatcher. Producers hold cloneable [`CompletionSink`]s; the single
//! consumer holds the [`CompletionReceiver`].

use guild_core::{CompletionEvent, GuildError, GuildResult, QueueItem};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Create a connected sink/receiver pair.
///
/// The queue is unbounded; `warn_depth` only controls when producers log
/// that the consumer is falling behind.
pub fn completion_queue(warn_depth: usize) -> (CompletionSink, CompletionReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        CompletionSink {
            tx,
            depth: Arc::clone(&depth),
            warn_depth,
        },
        CompletionReceiver { rx, depth },
    )
}

/// Producer side of the completion queue.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    tx: mpsc::UnboundedSender<QueueItem>,
    depth: Arc<AtomicUsize>,
    warn_depth: usize,
}

impl CompletionSink {
    /// Enqueue a completion event.
    pub fn post(&self, event: CompletionEvent) -> GuildResult<()> {
        debug!(
            operation_id = event.operation_id.as_ref().map(|id| id.as_str()),
            status = ?event.status,
            "Queued completion"
        );
        self.push(QueueItem::Completion(event))
    }

    /// Enqueue the shutdown sentinel.
    pub fn shutdown(&self) -> GuildResult<()> {
        debug!("Queued shutdown sentinel");
        self.push(QueueItem::Shutdown)
    }

    /// Items queued and not yet received.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, item: QueueItem) -> GuildResult<()> {
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(GuildError::QueueClosed);
        }
        if depth == self.warn_depth {
            warn!(depth, "Completion queue is backing up");
        }
        Ok(())
    }
}

/// Consumer side of the completion queue.
#[derive(Debug)]
pub struct CompletionReceiver {
    rx: mpsc::UnboundedReceiver<QueueItem>,
    depth: Arc<AtomicUsize>,
}

impl CompletionReceiver {
    /// Wait for the next item. `None` once every sink is gone.
    pub async fn recv(&mut self) -> Option<QueueItem> {
        let item = self.rx.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    /// Non-blocking receive, for draining in tests and diagnostics.
    pub fn try_recv(&mut self) -> Option<QueueItem> {
        let item = self.rx.try_recv().ok();
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::OperationId;

    #[tokio::test]
    async fn test_fifo_order() {
        let (sink, mut receiver) = completion_queue(8);
        sink.post(CompletionEvent::success(OperationId::sequential(2)))
            .unwrap();
        sink.post(CompletionEvent::success(OperationId::sequential(1)))
            .unwrap();
        sink.shutdown().unwrap();
        assert_eq!(sink.depth(), 3);

        let first = receiver.recv().await.unwrap();
        assert_eq!(
            first,
            QueueItem::Completion(CompletionEvent::success(OperationId::sequential(2)))
        );
        let second = receiver.recv().await.unwrap();
        assert_eq!(
            second,
            QueueItem::Completion(CompletionEvent::success(OperationId::sequential(1)))
        );
        assert_eq!(receiver.recv().await, Some(QueueItem::Shutdown));
        assert_eq!(receiver.depth(), 0);
    }

    #[tokio::test]
    async fn test_post_after_receiver_dropped() {
        let (sink, receiver) = completion_queue(8);
        drop(receiver);
        assert!(sink.is_closed());
        assert!(matches!(sink.shutdown(), Err(GuildError::QueueClosed)));
    }

    #[test]
    fn test_sentinel_follows_earlier_completions() {
        let (sink, mut receiver) = completion_queue(1);
        tokio_test::block_on(async {
            sink.post(CompletionEvent::error(OperationId::sequential(1), "boom"))
                .unwrap();
            sink.shutdown().unwrap();
            assert!(matches!(
                receiver.recv().await,
                Some(QueueItem::Completion(_))
            ));
            assert_eq!(receiver.recv().await, Some(QueueItem::Shutdown));
        });
    }

    #[test]
    fn test_try_recv_empty() {
        let (_sink, mut receiver) = completion_queue(8);
        assert!(receiver.try_recv().is_none());
    }
}
