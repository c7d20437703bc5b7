//! # Guild
//!
//! Guild lets a team of conversational agents drive a Minecraft bot whose
//! actions can take minutes. Long-running actions answer with a pending
//! marker straight away; their results come back later as completion
//! events, are matched to the tool call that started them and are fed
//! back into the conversation as that call's response.
//!
//! ## Crates
//!
//! - **[`core`]**: identifiers, actions, responses, completion events and
//!   the shared session state.
//! - **[`bridge`]**: operation registry, completion queue, invocation
//!   gateway, result dispatcher and the JSON-lines worker transport.
//! - **[`agents`]**: the coordinator, gatherer and crafter roles and the
//!   session that runs them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guild_workspace::{AgentRole, BridgeClient, BridgeConfig, ConversationState};
//! use guild_workspace::{JsonLinesTransport, ScriptedModel, Session};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = JsonLinesTransport::spawn("node", &["worker.js".to_string()])?;
//! let mut client = BridgeClient::new(Arc::new(transport), BridgeConfig::default());
//!
//! let model = ScriptedModel::load("plans/wooden_pickaxe.json").await?;
//! let mut session = Session::new(client.gateway(), Box::new(model), ConversationState::default())
//!     .shutdown_on_finish(client.completion_sink());
//!
//! let dispatcher = client.take_dispatcher()?;
//! session.start(AgentRole::Coordinator, "craft 1 wooden_pickaxe").await?;
//! let report = dispatcher.run(&mut session).await;
//! println!("delivered {} completions", report.delivered);
//! # Ok(())
//! # }
//! ```

pub use guild_agents as agents;
pub use guild_bridge as bridge;
pub use guild_core as core;

pub use guild_agents::{AgentRole, Decision, DecisionModel, ScriptedModel, Session, SessionError};
pub use guild_bridge::{
    BridgeClient, BridgeConfig, BridgeConfigBuilder, ConversationLoop, Delivery, DispatchReport,
    InvocationGateway, JsonLinesTransport, OperationRegistry, ResultDispatcher, WorkerTransport,
};
pub use guild_core::{
    Action, ActionKind, ActionResponse, CompletionEvent, ConversationState, CorrelationToken,
    GuildError, GuildResult, OperationId,
};
