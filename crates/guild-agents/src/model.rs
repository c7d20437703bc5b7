//! Decision models
//!
//! The session asks a [`DecisionModel`] what each agent does next. In
//! production that is a language model; [`ScriptedModel`] replays a fixed
//! plan and is what the CLI and tests use.

use async_trait::async_trait;
use guild_core::{CallId, ConversationState, FrameId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use tracing::{debug, warn};

use crate::agent::AgentRole;
use crate::error::{SessionError, SessionResult};
use crate::tools::Tool;

/// One tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// What an agent does on its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Call these tools, in order.
    CallTools(Vec<ToolInvocation>),
    /// Nothing to do until a pending call completes.
    Wait,
    /// Done; the text is the agent's final report.
    Finish(String),
}

/// One entry in a frame's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Task { text: String },
    ToolCall { call_id: CallId, tool: String, args: Value },
    ToolResponse { call_id: CallId, tool: String, response: Value },
    Final { text: String },
}

/// Everything the model may look at when deciding.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub session_id: &'a SessionId,
    pub frame_id: FrameId,
    pub role: AgentRole,
    /// The role's standing instructions.
    pub instructions: &'static str,
    /// Tools the role may call this turn.
    pub tools: &'static [Tool],
    pub transcript: &'a [TranscriptEntry],
    pub state: &'a ConversationState,
}

impl<'a> TurnContext<'a> {
    /// Context for `role`, carrying its instructions and toolset.
    pub fn for_role(
        session_id: &'a SessionId,
        frame_id: FrameId,
        role: AgentRole,
        transcript: &'a [TranscriptEntry],
        state: &'a ConversationState,
    ) -> Self {
        Self {
            session_id,
            frame_id,
            role,
            instructions: role.instructions(),
            tools: role.tools(),
            transcript,
            state,
        }
    }

    /// One `name: description` line per available tool.
    pub fn tool_catalogue(&self) -> String {
        self.tools
            .iter()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Calls that answered pending and have not completed yet.
    pub fn awaiting(&self) -> Vec<&CallId> {
        let mut open: Vec<&CallId> = Vec::new();
        for entry in self.transcript {
            if let TranscriptEntry::ToolResponse {
                call_id, response, ..
            } = entry
            {
                if response.get("status").and_then(Value::as_str) == Some("pending") {
                    open.push(call_id);
                } else {
                    open.retain(|id| *id != call_id);
                }
            }
        }
        open
    }
}

#[async_trait]
pub trait DecisionModel: Send + Sync {
    async fn decide(&mut self, context: TurnContext<'_>) -> SessionResult<Decision>;
}

/// Decision scripts per role, as stored in a plan file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub roles: BTreeMap<AgentRole, Vec<Decision>>,
}

/// Replays scripted decisions, one queue per role.
///
/// A role whose script has run out finishes with a note saying so.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    scripts: HashMap<AgentRole, VecDeque<Decision>>,
    goal: Option<String>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_plan(plan: Plan) -> Self {
        Self {
            scripts: plan
                .roles
                .into_iter()
                .map(|(role, steps)| (role, steps.into()))
                .collect(),
            goal: plan.goal,
        }
    }

    /// Load a JSON plan file.
    pub async fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let plan: Plan = serde_json::from_str(&raw)?;
        if plan.roles.is_empty() {
            return Err(SessionError::Plan("plan has no role scripts".to_string()));
        }
        Ok(Self::from_plan(plan))
    }

    /// Append `decision` to `role`'s script.
    pub fn then(mut self, role: AgentRole, decision: Decision) -> Self {
        self.scripts.entry(role).or_default().push_back(decision);
        self
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    /// Decisions not yet replayed for `role`.
    pub fn remaining(&self, role: AgentRole) -> usize {
        self.scripts.get(&role).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl DecisionModel for ScriptedModel {
    async fn decide(&mut self, context: TurnContext<'_>) -> SessionResult<Decision> {
        match self
            .scripts
            .get_mut(&context.role)
            .and_then(VecDeque::pop_front)
        {
            Some(decision) => {
                debug!(
                    role = %context.role,
                    frame = %context.frame_id,
                    ?decision,
                    "Scripted decision"
                );
                Ok(decision)
            }
            None => {
                warn!(role = %context.role, frame = %context.frame_id, "Script exhausted");
                Ok(Decision::Finish(format!(
                    "{} has no further scripted steps.",
                    context.role
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_serialization() {
        let plan: Plan = serde_json::from_value(json!({
            "goal": "craft 1 wooden_pickaxe",
            "roles": {
                "CoordinatorAgent": [
                    {"call_tools": [
                        {"tool": "GathererAgent", "args": {"request": "collect 3 oak_log"}}
                    ]},
                    "wait",
                    {"finish": "done"}
                ]
            }
        }))
        .unwrap();
        let steps = &plan.roles[&AgentRole::Coordinator];
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1], Decision::Wait);
        assert_eq!(steps[2], Decision::Finish("done".into()));
    }

    #[test]
    fn test_awaiting_calls() {
        let a = CallId::parse("call-1").unwrap();
        let b = CallId::parse("call-2").unwrap();
        let transcript = vec![
            TranscriptEntry::ToolResponse {
                call_id: a.clone(),
                tool: "mine_target_block_tool".into(),
                response: json!({"status": "pending", "operation_id": "op-1"}),
            },
            TranscriptEntry::ToolResponse {
                call_id: b.clone(),
                tool: "mine_target_block_tool".into(),
                response: json!({"status": "pending", "operation_id": "op-2"}),
            },
            TranscriptEntry::ToolResponse {
                call_id: a.clone(),
                tool: "mine_target_block_tool".into(),
                response: json!({"status": "success"}),
            },
        ];
        let state = ConversationState::default();
        let session_id = SessionId::parse("s").unwrap();
        let context = TurnContext::for_role(
            &session_id,
            FrameId::ROOT,
            AgentRole::Gatherer,
            &transcript,
            &state,
        );
        assert_eq!(context.awaiting(), vec![&b]);
    }

    #[tokio::test]
    async fn test_scripted_replay_and_exhaustion() {
        let mut model = ScriptedModel::new()
            .then(AgentRole::Crafter, Decision::Wait)
            .then(AgentRole::Crafter, Decision::Finish("crafted".into()));
        let state = ConversationState::default();
        let session_id = SessionId::parse("s").unwrap();
        let context =
            TurnContext::for_role(&session_id, FrameId(1), AgentRole::Crafter, &[], &state);

        assert_eq!(model.decide(context).await.unwrap(), Decision::Wait);
        assert_eq!(model.remaining(AgentRole::Crafter), 1);
        model.decide(context).await.unwrap();
        let Decision::Finish(note) = model.decide(context).await.unwrap() else {
            panic!("expected finish");
        };
        assert!(note.contains("CrafterAgent"));
    }

    #[derive(Default)]
    struct PromptRecorder {
        seen: Vec<(AgentRole, &'static str, String)>,
    }

    #[async_trait]
    impl DecisionModel for PromptRecorder {
        async fn decide(&mut self, context: TurnContext<'_>) -> SessionResult<Decision> {
            self.seen
                .push((context.role, context.instructions, context.tool_catalogue()));
            Ok(Decision::Finish("done".into()))
        }
    }

    #[test]
    fn test_context_carries_role_prompt_and_tools() {
        let state = ConversationState::default();
        let session_id = SessionId::parse("s").unwrap();
        let mut model = PromptRecorder::default();

        tokio_test::block_on(async {
            for role in [AgentRole::Coordinator, AgentRole::Crafter] {
                let context = TurnContext::for_role(&session_id, FrameId::ROOT, role, &[], &state);
                model.decide(context).await.unwrap();
            }
        });

        let (role, instructions, catalogue) = &model.seen[0];
        assert_eq!(*role, AgentRole::Coordinator);
        assert_eq!(*instructions, crate::prompts::COORDINATOR_INSTRUCTION);
        assert_eq!(
            catalogue.lines().collect::<Vec<_>>(),
            vec![
                "GathererAgent: Collects resources like wood and stone, and can place blocks.",
                "CrafterAgent: Crafts items and can memorize recipes.",
            ]
        );

        let (_, instructions, catalogue) = &model.seen[1];
        assert_eq!(*instructions, crate::prompts::CRAFTER_INSTRUCTION);
        assert!(catalogue.starts_with("craft_target_item_tool: Crafts quantity of item_name."));
        assert!(catalogue.contains("memorize_recipe_tool:"));
        assert!(!catalogue.contains("mine_target_block_tool"));
    }

    #[tokio::test]
    async fn test_load_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"{"roles": {"GathererAgent": [{"finish": "nothing to gather"}]}}"#,
        )
        .unwrap();
        let model = ScriptedModel::load(&path).await.unwrap();
        assert_eq!(model.remaining(AgentRole::Gatherer), 1);

        std::fs::write(&path, r#"{"roles": {}}"#).unwrap();
        assert!(matches!(
            ScriptedModel::load(&path).await,
            Err(SessionError::Plan(_))
        ));
    }
}
