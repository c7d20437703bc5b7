//! # Guild Core
//!
//! Core types shared by the Guild crates: validated identifiers, worker
//! actions, the responses handed back to the conversation, completion
//! events, and the session state the agents work against.

pub mod action;
pub mod completion;
pub mod error;
pub mod identifiers;
pub mod outcome;
pub mod state;

pub use action::{
    Action, ActionKind, BlockLocation, BotOptions, CraftItemArgs, FindBlockArgs, InvocationMode,
    ItemDetail, MineBlockArgs, PlaceBlockArgs,
};
pub use completion::{CompletionEvent, CompletionStatus, QueueItem};
pub use error::{GuildError, GuildResult};
pub use identifiers::{
    CallId, CorrelationToken, FrameId, IdValidationError, OperationId, SessionId,
};
pub use outcome::{ActionOutcome, ActionPayload, ActionResponse, ResponseStatus};
pub use state::{ConversationState, Recipe};
