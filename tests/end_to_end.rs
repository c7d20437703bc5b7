//! The bundled wooden pickaxe plan, run end to end against the mock worker.

use guild_testing::MockWorker;
use guild_workspace::bridge::{OperationIdStrategy, StopReason};
use guild_workspace::{
    ActionKind, AgentRole, BridgeClient, BridgeConfigBuilder, ConversationState, ScriptedModel,
    Session,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn plan_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("plans/wooden_pickaxe.json")
}

fn pickaxe_worker() -> MockWorker {
    MockWorker::new()
        .with_reply(
            ActionKind::FindBlock,
            json!({"status": "success", "location": {"x": 12, "y": 64, "z": -3}}),
        )
        .auto_complete(ActionKind::MineBlock, json!({}))
        .auto_complete(ActionKind::CraftItem, json!({}))
        .auto_complete(ActionKind::PlaceBlock, json!({}))
}

#[tokio::test]
async fn wooden_pickaxe_plan_completes() {
    let worker = pickaxe_worker();
    let config = BridgeConfigBuilder::new()
        .operation_ids(OperationIdStrategy::Sequential)
        .build()
        .unwrap();
    let mut client = BridgeClient::new(Arc::new(worker.clone()), config);
    let model = ScriptedModel::load(plan_path()).await.unwrap();
    let state = ConversationState::with_goal("craft 1 wooden_pickaxe").with_plan(
        guild_workspace::agents::PICKAXE_PLAN
            .iter()
            .map(|step| step.to_string())
            .collect(),
    );
    let mut session = Session::new(client.gateway(), Box::new(model), state)
        .shutdown_on_finish(client.completion_sink());

    let dispatcher = client.take_dispatcher().unwrap();
    session
        .start(AgentRole::Coordinator, "craft 1 wooden_pickaxe")
        .await
        .unwrap();
    let report = dispatcher.run(&mut session).await;

    assert_eq!(report.stop_reason, StopReason::Sentinel);
    // Three mines, four crafts and one placement.
    assert_eq!(report.delivered, 8);
    assert_eq!(report.failed, 0);
    assert!(report.orphaned.is_empty());
    assert!(client.registry().is_empty());

    assert_eq!(
        session.final_report(),
        Some("Successfully crafted 1 wooden pickaxe.")
    );
    let state = session.into_state();
    assert_eq!(state.item_count("wooden_pickaxe"), 1);
    assert_eq!(state.item_count("oak_log"), 3);
    assert_eq!(state.item_count("oak_planks"), 12);
    assert_eq!(state.item_count("stick"), 4);
    assert_eq!(state.item_count("crafting_table"), 0);
    assert_eq!(
        state.placed_crafting_table_location,
        Some(guild_workspace::core::BlockLocation::new(10, 64, -1))
    );
    assert_eq!(state.current_plan_step_index, 6);
    assert_eq!(state.last_sub_task_result.as_deref(), Some("Crafted 1 wooden_pickaxe."));

    assert_eq!(worker.requests_for(ActionKind::MineBlock).len(), 3);
    assert_eq!(worker.requests_for(ActionKind::CraftItem).len(), 4);
}

#[tokio::test]
async fn interrupted_session_reports_orphans() {
    // Mining is acknowledged but never completes.
    let worker = MockWorker::new().with_reply(
        ActionKind::FindBlock,
        json!({"status": "success", "location": {"x": 12, "y": 64, "z": -3}}),
    );
    let mut client = BridgeClient::new(
        Arc::new(worker.clone()),
        BridgeConfigBuilder::new().build().unwrap(),
    );
    let model = ScriptedModel::load(plan_path()).await.unwrap();
    let mut session = Session::new(client.gateway(), Box::new(model), ConversationState::default());

    let dispatcher = client.take_dispatcher().unwrap();
    session
        .start(AgentRole::Coordinator, "craft 1 wooden_pickaxe")
        .await
        .unwrap();
    client.completion_sink().shutdown().unwrap();
    let report = dispatcher.run(&mut session).await;

    assert_eq!(report.delivered, 0);
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].action, ActionKind::MineBlock);
    assert!(!session.is_finished());
    assert_eq!(session.state().item_count("oak_log"), 0);
}

#[test]
fn bundled_plan_scripts_every_role() {
    let model = tokio_test::block_on(ScriptedModel::load(plan_path())).unwrap();

    assert_eq!(model.goal(), Some("craft 1 wooden_pickaxe"));
    assert_eq!(model.remaining(AgentRole::Coordinator), 7);
    assert_eq!(model.remaining(AgentRole::Gatherer), 11);
    assert_eq!(model.remaining(AgentRole::Crafter), 12);
}
