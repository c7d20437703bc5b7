//! # Guild Agents
//!
//! The agent team that plays the game through the bridge: a coordinator
//! that delegates, a gatherer and a crafter that call worker actions, and
//! the [`Session`] that runs them against shared state.
//!
//! What each agent does next comes from a [`DecisionModel`]. The session
//! turns tool calls into gateway invocations, keeps long-running calls
//! open until the dispatcher resumes it with their completions, and
//! routes a sub-agent's final report back to the delegating call.

pub mod agent;
pub mod error;
pub mod model;
pub mod prompts;
pub mod session;
pub mod tools;

pub use agent::AgentRole;
pub use error::{SessionError, SessionResult};
pub use model::{
    Decision, DecisionModel, Plan, ScriptedModel, ToolInvocation, TranscriptEntry, TurnContext,
};
pub use session::{FrameSnapshot, FrameStatus, Session, SessionConfig};
pub use tools::Tool;
pub use prompts::PICKAXE_PLAN;
