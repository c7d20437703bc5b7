//! # Recording Conversation
//!
//! A [`ConversationLoop`] that records what it was given and can stop the
//! dispatcher after a fixed number of deliveries.

use async_trait::async_trait;
use guild_bridge::{CompletionSink, ConversationLoop, Delivery};
use guild_core::{CallId, GuildResult};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct RecordingConversation {
    deliveries: Vec<Delivery>,
    shutdown_after: Option<(usize, CompletionSink)>,
    reaction_time: Option<Duration>,
}

impl RecordingConversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post the shutdown sentinel once `count` deliveries have been seen.
    pub fn shutdown_after(mut self, count: usize, sink: CompletionSink) -> Self {
        self.shutdown_after = Some((count, sink));
        self
    }

    /// Spend `delay` reacting to each delivery.
    pub fn with_reaction_time(mut self, delay: Duration) -> Self {
        self.reaction_time = Some(delay);
        self
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Call ids of the deliveries, in arrival order.
    pub fn resumed_calls(&self) -> Vec<CallId> {
        self.deliveries
            .iter()
            .map(|d| d.token.call_id.clone())
            .collect()
    }
}

#[async_trait]
impl ConversationLoop for RecordingConversation {
    async fn resume(&mut self, delivery: Delivery) -> GuildResult<()> {
        if let Some(delay) = self.reaction_time {
            tokio::time::sleep(delay).await;
        }
        self.deliveries.push(delivery);
        if let Some((count, sink)) = &self.shutdown_after {
            if self.deliveries.len() == *count {
                sink.shutdown()?;
            }
        }
        Ok(())
    }
}
