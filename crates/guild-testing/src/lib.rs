//! # Guild Testing
//!
//! Test doubles for exercising the bridge without a game server:
//!
//! - [`MockWorker`] scripts worker replies and emits completions on demand.
//! - [`RecordingConversation`] records deliveries from the dispatcher.
//! - [`fixtures`] builds tokens and actions used across test suites.

pub mod conversation;
pub mod mock_worker;

pub use conversation::RecordingConversation;
pub use mock_worker::MockWorker;

pub mod fixtures {
    use guild_core::{
        Action, BlockLocation, CallId, CorrelationToken, FrameId, MineBlockArgs, SessionId,
    };

    /// Token for call `call` in the root frame of `session-test`.
    pub fn token(call: &str) -> CorrelationToken {
        token_in(FrameId::ROOT, call)
    }

    pub fn token_in(frame: FrameId, call: &str) -> CorrelationToken {
        CorrelationToken::new(
            SessionId::parse("session-test").expect("valid session id"),
            frame,
            CallId::parse(call).expect("valid call id"),
        )
    }

    pub fn mine(block_type: &str, x: i32, y: i32, z: i32) -> Action {
        Action::MineBlock(MineBlockArgs {
            block_type: block_type.to_string(),
            at: BlockLocation::new(x, y, z),
        })
    }

    pub fn move_to(x: i32, y: i32, z: i32) -> Action {
        Action::MoveTo(BlockLocation::new(x, y, z))
    }
}
