//! The `run` and `config` commands.

use guild_agents::{AgentRole, PICKAXE_PLAN, ScriptedModel, Session, SessionError};
use guild_bridge::{
    BridgeClient, BridgeConfig, BridgeConfigBuilder, ConfigError, JsonLinesTransport,
    WorkerSettings,
};
use guild_core::{
    Action, CallId, ConversationState, CorrelationToken, FrameId, GuildError, SessionId,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_GOAL: &str = "craft 1 wooden_pickaxe";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] GuildError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Bot initialization failed: {0}")]
    Initialize(String),
}

impl CliError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "CONFIG_ERROR",
            CliError::Bridge(e) => e.error_code(),
            CliError::Session(e) => e.error_code(),
            CliError::Initialize(_) => "INITIALIZE_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct RunOptions {
    pub plan: PathBuf,
    pub worker: String,
    pub worker_args: Vec<String>,
    pub goal: Option<String>,
}

fn load_config() -> Result<(BridgeConfig, WorkerSettings), CliError> {
    let bridge = BridgeConfigBuilder::from_env()?.build()?;
    let worker = WorkerSettings::from_env()?;
    Ok((bridge, worker))
}

pub fn print_config() -> Result<(), CliError> {
    let (bridge, worker) = load_config()?;
    let effective = json!({
        "bridge": {
            "bridge_timeout_secs": bridge.bridge_timeout.as_secs(),
            "ack_timeout_secs": bridge.ack_timeout.as_secs(),
            "operation_ids": bridge.operation_ids.to_string(),
            "queue_warn_depth": bridge.queue_warn_depth,
        },
        "worker": worker,
    });
    let rendered = serde_json::to_string_pretty(&effective).map_err(GuildError::from)?;
    println!("{rendered}");
    Ok(())
}

pub async fn run_session(options: RunOptions) -> Result<(), CliError> {
    let (config, settings) = load_config()?;
    let model = ScriptedModel::load(&options.plan).await?;
    let goal = options
        .goal
        .or_else(|| model.goal().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_GOAL.to_string());

    let transport = JsonLinesTransport::spawn(&options.worker, &options.worker_args)?;
    let mut client = BridgeClient::new(Arc::new(transport), config);
    let session_id = SessionId::generate();

    let init = Action::InitializeBot(settings.bot_options());
    let token = CorrelationToken::new(session_id.clone(), FrameId::ROOT, CallId::sequential(0));
    let reply = client.gateway().invoke_sync(&init, &token).await;
    if reply.is_error() {
        let message = reply.message.unwrap_or_else(|| "no message".to_string());
        return Err(CliError::Initialize(message));
    }
    info!(
        host = %settings.host,
        port = settings.port,
        username = %settings.username,
        "Bot initialized"
    );

    let sink = client.completion_sink();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the dispatcher");
            if let Err(e) = sink.shutdown() {
                warn!("Could not post shutdown sentinel: {}", e);
            }
        }
    });

    let state = ConversationState::with_goal(goal.clone())
        .with_plan(PICKAXE_PLAN.iter().map(|step| step.to_string()).collect());
    let mut session = Session::new(client.gateway(), Box::new(model), state)
        .with_id(session_id)
        .shutdown_on_finish(client.completion_sink());

    let dispatcher = client.take_dispatcher()?;
    session.start(AgentRole::Coordinator, goal).await?;
    let report = dispatcher.run(&mut session).await;

    info!(
        delivered = report.delivered,
        failed = report.failed,
        orphaned = report.orphaned.len(),
        stop_reason = ?report.stop_reason,
        "Session ended"
    );
    if let Some(text) = session.final_report() {
        info!(report = %text, "Coordinator report");
    }
    let state = session.into_state();
    match serde_json::to_string(&state) {
        Ok(rendered) => info!(state = %rendered, "Final session state"),
        Err(e) => warn!("Could not render final state: {}", e),
    }
    if state.item_count("wooden_pickaxe") > 0 {
        info!("Wooden pickaxe crafted");
    } else {
        warn!("No wooden pickaxe in the inventory");
    }
    Ok(())
}
