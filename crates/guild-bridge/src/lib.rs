//! # Guild Bridge
//!
//! Connects a turn-based agent conversation to an automation worker that
//! finishes long-running actions out of band.
//!
//! The pieces:
//!
//! - [`InvocationGateway`] sends every tool call to the worker. Quick
//!   actions wait for the worker's reply; long-running ones are registered
//!   in the [`OperationRegistry`] and answered immediately with a pending
//!   marker.
//! - The worker later posts a completion event to the [`CompletionSink`].
//! - The [`ResultDispatcher`] drains the queue in order, looks up who was
//!   waiting, and resumes the [`ConversationLoop`] with the result.
//!
//! A [`BridgeClient`] owns one registry, one queue and one transport.
//!
//! ```rust,ignore
//! let transport = Arc::new(JsonLinesTransport::spawn("node", &["worker.js".into()])?);
//! let mut client = BridgeClient::new(transport, BridgeConfigBuilder::from_env()?.build()?);
//! let gateway = client.gateway();
//! let dispatcher = client.take_dispatcher()?;
//! // drive the first turn with `gateway`, then:
//! let report = dispatcher.run(&mut conversation).await;
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod jsonl;
pub mod queue;
pub mod registry;
pub mod transport;

pub use client::BridgeClient;
pub use config::{
    BridgeConfig, BridgeConfigBuilder, ConfigError, OperationIdStrategy, WorkerSettings,
};
pub use dispatcher::{ConversationLoop, Delivery, DispatchReport, ResultDispatcher, StopReason};
pub use gateway::{InvocationGateway, OperationIds};
pub use jsonl::JsonLinesTransport;
pub use queue::{CompletionReceiver, CompletionSink, completion_queue};
pub use registry::{Operation, OperationRegistry, OperationStatus};
pub use transport::{WorkerRequest, WorkerTransport};
