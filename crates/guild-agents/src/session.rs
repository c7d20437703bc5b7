//! Agent session
//!
//! A session runs the agent team against one [`ConversationState`]. Each
//! agent run is a frame: the coordinator is the root frame, and every
//! delegation opens a child frame whose final report answers the parent's
//! delegation call. Frames that are ready for another turn sit on a run
//! queue; the session drains it after the first turn and after every
//! delivery, so there is never more than one turn in progress.
//!
//! Long-running tool calls answer with a pending marker and stay open. The
//! dispatcher later resumes the session with the completion addressed to
//! the call's [`CorrelationToken`].

use async_trait::async_trait;
use guild_bridge::{CompletionSink, ConversationLoop, Delivery, InvocationGateway};
use guild_core::{
    Action, ActionOutcome, ActionResponse, CallId, ConversationState, CorrelationToken, FrameId,
    GuildResult, SessionId,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

use crate::agent::AgentRole;
use crate::error::{SessionError, SessionResult};
use crate::model::{Decision, DecisionModel, ToolInvocation, TranscriptEntry, TurnContext};
use crate::tools::{DelegationArgs, MemorizeRecipeArgs, Tool, action_from_args};

/// Session limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Turns a single frame may take before it is stopped.
    pub max_turns_per_frame: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns_per_frame: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Running,
    Waiting,
    Finished,
}

/// A tool call that has not produced its final response yet.
#[derive(Debug, Clone)]
enum OpenCall {
    /// Long-running action acknowledged by the worker.
    Action { tool: Tool, action: Action },
    /// Delegation answered by the child frame's final report.
    Delegation { child: FrameId },
}

#[derive(Debug)]
struct Frame {
    role: AgentRole,
    parent: Option<(FrameId, CallId)>,
    transcript: Vec<TranscriptEntry>,
    open_calls: HashMap<CallId, OpenCall>,
    status: FrameStatus,
    turns: usize,
    result: Option<String>,
}

impl Frame {
    fn new(role: AgentRole, task: String, parent: Option<(FrameId, CallId)>) -> Self {
        Self {
            role,
            parent,
            transcript: vec![TranscriptEntry::Task { text: task }],
            open_calls: HashMap::new(),
            status: FrameStatus::Running,
            turns: 0,
            result: None,
        }
    }

    fn has_open_delegation(&self) -> bool {
        self.open_calls
            .values()
            .any(|call| matches!(call, OpenCall::Delegation { .. }))
    }
}

/// Read-only view of a frame for diagnostics and tests.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub id: FrameId,
    pub role: AgentRole,
    pub status: FrameStatus,
    pub transcript: Vec<TranscriptEntry>,
    pub open_calls: usize,
    pub result: Option<String>,
}

pub struct Session {
    id: SessionId,
    gateway: InvocationGateway,
    model: Box<dyn DecisionModel>,
    state: ConversationState,
    config: SessionConfig,
    frames: BTreeMap<FrameId, Frame>,
    run_queue: VecDeque<FrameId>,
    next_frame: u64,
    next_call: u64,
    shutdown: Option<CompletionSink>,
}

impl Session {
    pub fn new(
        gateway: InvocationGateway,
        model: Box<dyn DecisionModel>,
        state: ConversationState,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            gateway,
            model,
            state,
            config: SessionConfig::default(),
            frames: BTreeMap::new(),
            run_queue: VecDeque::new(),
            next_frame: 0,
            next_call: 0,
            shutdown: None,
        }
    }

    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Post the shutdown sentinel to `sink` once the root frame finishes.
    pub fn shutdown_on_finish(mut self, sink: CompletionSink) -> Self {
        self.shutdown = Some(sink);
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn into_state(self) -> ConversationState {
        self.state
    }

    /// The coordinator's final report, once it has finished.
    pub fn final_report(&self) -> Option<&str> {
        self.frames
            .get(&FrameId::ROOT)
            .and_then(|frame| frame.result.as_deref())
    }

    pub fn is_finished(&self) -> bool {
        self.frames
            .get(&FrameId::ROOT)
            .is_some_and(|frame| frame.status == FrameStatus::Finished)
    }

    pub fn frame(&self, id: FrameId) -> Option<FrameSnapshot> {
        self.frames.get(&id).map(|frame| FrameSnapshot {
            id,
            role: frame.role,
            status: frame.status,
            transcript: frame.transcript.clone(),
            open_calls: frame.open_calls.len(),
            result: frame.result.clone(),
        })
    }

    pub fn frames(&self) -> Vec<FrameSnapshot> {
        self.frames.keys().filter_map(|id| self.frame(*id)).collect()
    }

    /// Open the root frame with `goal` and run until every frame is
    /// finished or waiting on the worker.
    pub async fn start(&mut self, root: AgentRole, goal: impl Into<String>) -> SessionResult<()> {
        if !self.frames.is_empty() {
            return Err(SessionError::AlreadyStarted);
        }
        let goal = goal.into();
        if self.state.current_high_level_goal.is_none() {
            self.state.current_high_level_goal = Some(goal.clone());
        }
        info!(session = %self.id, role = %root, goal = %goal, "Session started");

        let root_id = self.open_frame(root, goal, None);
        debug_assert_eq!(root_id, FrameId::ROOT);
        self.drive().await
    }

    /// Route a completion to its frame and run whatever becomes runnable.
    pub async fn deliver(&mut self, delivery: Delivery) -> SessionResult<()> {
        let token = &delivery.token;
        if token.session_id != self.id {
            return Err(SessionError::ForeignSession(token.session_id.clone()));
        }
        let frame_id = token.frame_id;
        let frame = self
            .frames
            .get_mut(&frame_id)
            .ok_or(SessionError::UnknownFrame(frame_id))?;
        if frame.status == FrameStatus::Finished {
            warn!(
                frame = %frame_id,
                operation_id = %delivery.operation_id(),
                "Completion arrived after its frame finished"
            );
            return Err(SessionError::FrameFinished(frame_id));
        }

        let (tool, action) = match frame.open_calls.remove(&token.call_id) {
            Some(OpenCall::Action { tool, action }) => (tool, action),
            Some(delegation @ OpenCall::Delegation { .. }) => {
                frame.open_calls.insert(token.call_id.clone(), delegation);
                return Err(SessionError::UnknownCall {
                    frame: frame_id,
                    call: token.call_id.clone(),
                });
            }
            None => {
                return Err(SessionError::UnknownCall {
                    frame: frame_id,
                    call: token.call_id.clone(),
                });
            }
        };

        info!(
            frame = %frame_id,
            call = %token.call_id,
            operation_id = %delivery.operation_id(),
            status = ?delivery.payload.status,
            "Resuming deferred call"
        );
        let response = delivery.payload;
        apply_effects(&mut self.state, &action, &response);
        self.record_response(frame_id, token.call_id.clone(), tool, response.to_value());
        self.mark_runnable(frame_id);
        self.drive().await
    }

    fn open_frame(
        &mut self,
        role: AgentRole,
        task: String,
        parent: Option<(FrameId, CallId)>,
    ) -> FrameId {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        debug!(frame = %id, role = %role, task = %task, "Opened frame");
        self.frames.insert(id, Frame::new(role, task, parent));
        self.run_queue.push_back(id);
        id
    }

    fn next_call_id(&mut self) -> CallId {
        self.next_call += 1;
        CallId::sequential(self.next_call)
    }

    /// Queue `frame_id` for another turn unless it is blocked on a child.
    fn mark_runnable(&mut self, frame_id: FrameId) {
        let Some(frame) = self.frames.get_mut(&frame_id) else {
            return;
        };
        if frame.status == FrameStatus::Finished || frame.has_open_delegation() {
            return;
        }
        frame.status = FrameStatus::Running;
        if !self.run_queue.contains(&frame_id) {
            self.run_queue.push_back(frame_id);
        }
    }

    fn record_response(&mut self, frame_id: FrameId, call_id: CallId, tool: Tool, response: Value) {
        if let Some(frame) = self.frames.get_mut(&frame_id) {
            frame.transcript.push(TranscriptEntry::ToolResponse {
                call_id,
                tool: tool.name().to_string(),
                response,
            });
        }
    }

    async fn drive(&mut self) -> SessionResult<()> {
        while let Some(frame_id) = self.run_queue.pop_front() {
            self.run_turn(frame_id).await?;
        }
        Ok(())
    }

    async fn run_turn(&mut self, frame_id: FrameId) -> SessionResult<()> {
        let (role, turns) = {
            let frame = self
                .frames
                .get_mut(&frame_id)
                .ok_or(SessionError::UnknownFrame(frame_id))?;
            if frame.status == FrameStatus::Finished {
                return Ok(());
            }
            frame.turns += 1;
            (frame.role, frame.turns)
        };

        if turns > self.config.max_turns_per_frame {
            warn!(frame = %frame_id, role = %role, turns, "Turn limit reached");
            self.finish_frame(
                frame_id,
                format!("{role} stopped after {} turns without finishing.", turns - 1),
            );
            return Ok(());
        }

        let decision = {
            let frame = &self.frames[&frame_id];
            let context =
                TurnContext::for_role(&self.id, frame_id, role, &frame.transcript, &self.state);
            self.model.decide(context).await?
        };

        match decision {
            Decision::CallTools(calls) => self.call_tools(frame_id, role, calls).await,
            Decision::Wait => {
                let frame = self
                    .frames
                    .get_mut(&frame_id)
                    .ok_or(SessionError::UnknownFrame(frame_id))?;
                if frame.open_calls.is_empty() {
                    warn!(frame = %frame_id, role = %role, "Agent waits with nothing pending");
                    self.finish_frame(
                        frame_id,
                        format!("{role} stopped: waiting with no pending calls."),
                    );
                } else {
                    debug!(frame = %frame_id, open = frame.open_calls.len(), "Frame waiting");
                    frame.status = FrameStatus::Waiting;
                }
            }
            Decision::Finish(text) => self.finish_frame(frame_id, text),
        }
        Ok(())
    }

    async fn call_tools(&mut self, frame_id: FrameId, role: AgentRole, calls: Vec<ToolInvocation>) {
        for invocation in calls {
            let call_id = self.next_call_id();
            if let Some(frame) = self.frames.get_mut(&frame_id) {
                frame.transcript.push(TranscriptEntry::ToolCall {
                    call_id: call_id.clone(),
                    tool: invocation.tool.clone(),
                    args: invocation.args.clone(),
                });
            }

            let resolved = match Tool::resolve(&invocation.tool) {
                Ok(tool) if role.can_use(tool) => Ok(tool),
                Ok(_) => Err(format!("Tool '{}' is not available to {role}.", invocation.tool)),
                Err(e) => Err(e.to_string()),
            };
            let tool = match resolved {
                Ok(tool) => tool,
                Err(message) => {
                    warn!(
                        frame = %frame_id,
                        role = %role,
                        tool = %invocation.tool,
                        "Tool not available"
                    );
                    let response = ActionResponse::error(None, message);
                    if let Some(frame) = self.frames.get_mut(&frame_id) {
                        frame.transcript.push(TranscriptEntry::ToolResponse {
                            call_id,
                            tool: invocation.tool,
                            response: response.to_value(),
                        });
                    }
                    continue;
                }
            };

            match tool {
                Tool::Action(kind) => {
                    let response = match action_from_args(kind, &invocation.args) {
                        Ok(action) => self.invoke(frame_id, call_id.clone(), tool, action).await,
                        Err(e) => ActionResponse::error(None, e.to_string()),
                    };
                    self.record_response(frame_id, call_id, tool, response.to_value());
                }
                Tool::MemorizeRecipe => {
                    let response = self.memorize_recipe(&invocation.args);
                    self.record_response(frame_id, call_id, tool, response.to_value());
                }
                Tool::Delegate(child_role) => {
                    match serde_json::from_value::<DelegationArgs>(invocation.args) {
                        Ok(args) => {
                            let child = self.open_frame(
                                child_role,
                                args.request,
                                Some((frame_id, call_id.clone())),
                            );
                            if let Some(frame) = self.frames.get_mut(&frame_id) {
                                frame
                                    .open_calls
                                    .insert(call_id, OpenCall::Delegation { child });
                            }
                        }
                        Err(e) => {
                            let response = ActionResponse::error(
                                None,
                                format!("Invalid delegation arguments: {e}"),
                            );
                            self.record_response(frame_id, call_id, tool, response.to_value());
                        }
                    }
                }
            }
        }

        self.mark_runnable(frame_id);
    }

    /// Send an action through the gateway and apply what it returns.
    ///
    /// A pending marker leaves the call open until the completion arrives.
    async fn invoke(
        &mut self,
        frame_id: FrameId,
        call_id: CallId,
        tool: Tool,
        action: Action,
    ) -> ActionResponse {
        let token = CorrelationToken::new(self.id.clone(), frame_id, call_id.clone());
        let response = self.gateway.invoke(&action, &token).await;

        if response.is_pending() {
            if let Some(frame) = self.frames.get_mut(&frame_id) {
                frame
                    .open_calls
                    .insert(call_id, OpenCall::Action { tool, action });
            }
        } else {
            apply_effects(&mut self.state, &action, &response);
        }
        response
    }

    fn memorize_recipe(&mut self, args: &Value) -> ActionResponse {
        let args: MemorizeRecipeArgs = match serde_json::from_value(args.clone()) {
            Ok(args) => args,
            Err(e) => return ActionResponse::error(None, format!("Invalid arguments: {e}")),
        };
        match self.state.memorize_recipe(&args.item_name, &args.recipe_details) {
            Ok(_) => {
                info!(item = %args.item_name, "Recipe memorized");
                ActionResponse::success(Default::default())
                    .with_field("item_name", json!(args.item_name))
                    .with_message("Recipe memorized.")
            }
            Err(e) => {
                warn!(item = %args.item_name, "Recipe not memorized: {}", e);
                ActionResponse::error(None, "Recipe details malformed.")
            }
        }
    }

    fn finish_frame(&mut self, frame_id: FrameId, text: String) {
        let Some(frame) = self.frames.get_mut(&frame_id) else {
            return;
        };
        frame.status = FrameStatus::Finished;
        frame.result = Some(text.clone());
        frame.transcript.push(TranscriptEntry::Final { text: text.clone() });
        if !frame.open_calls.is_empty() {
            warn!(
                frame = %frame_id,
                open = frame.open_calls.len(),
                "Frame finished with calls still open; their results will be dropped"
            );
        }
        let role = frame.role;
        let parent = frame.parent.clone();
        self.state
            .agent_outputs
            .insert(role.output_key().to_string(), text.clone());
        info!(frame = %frame_id, role = %role, report = %text, "Agent finished");

        match parent {
            Some((parent_id, call_id)) => {
                self.state.record_sub_task_result(text.clone());
                if let Some(parent) = self.frames.get_mut(&parent_id) {
                    parent.open_calls.remove(&call_id);
                }
                let response = ActionResponse::success(Default::default())
                    .with_field("result", json!(text));
                self.record_response(parent_id, call_id, Tool::Delegate(role), response.to_value());
                self.mark_runnable(parent_id);
            }
            None => {
                if let Some(sink) = &self.shutdown {
                    if let Err(e) = sink.shutdown() {
                        warn!("Could not post shutdown sentinel: {}", e);
                    }
                }
            }
        }
    }
}

/// Apply the state effects of a final action response.
fn apply_effects(state: &mut ConversationState, action: &Action, response: &ActionResponse) {
    match ActionOutcome::from_response(action.kind(), response) {
        Ok(ActionOutcome::Success(payload)) => state.apply_success(action, &payload),
        Ok(ActionOutcome::Error(message)) => {
            debug!(action = %action, message = %message, "Action failed; state unchanged")
        }
        Ok(ActionOutcome::Pending(_)) => {}
        Err(e) => warn!(action = %action, "Unreadable success payload: {}", e),
    }
}

#[async_trait]
impl ConversationLoop for Session {
    async fn resume(&mut self, delivery: Delivery) -> GuildResult<()> {
        self.deliver(delivery).await.map_err(Into::into)
    }
}
