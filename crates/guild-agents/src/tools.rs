//! Tools the agents can call, by the names the decision model uses.

use guild_core::{Action, ActionKind, GuildError, GuildResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;

use crate::agent::AgentRole;

const ALL_TOOLS: &[Tool] = &[
    Tool::Action(ActionKind::FindBlock),
    Tool::Action(ActionKind::MoveTo),
    Tool::Action(ActionKind::MineBlock),
    Tool::Action(ActionKind::ViewInventory),
    Tool::Action(ActionKind::PlaceBlock),
    Tool::Action(ActionKind::CraftItem),
    Tool::MemorizeRecipe,
    Tool::Delegate(AgentRole::Gatherer),
    Tool::Delegate(AgentRole::Crafter),
];

/// What a tool name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Forwarded to the worker through the gateway.
    Action(ActionKind),
    /// Stores a recipe in session state; no worker round-trip.
    MemorizeRecipe,
    /// Runs another agent on a sub-task and answers with its final report.
    Delegate(AgentRole),
}

impl Tool {
    /// Every tool an agent can be given.
    pub fn all() -> &'static [Tool] {
        ALL_TOOLS
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Action(ActionKind::InitializeBot) => "initialize_bot_tool",
            Tool::Action(ActionKind::MoveTo) => "move_to_xyz_tool",
            Tool::Action(ActionKind::FindBlock) => "find_nearest_block_tool",
            Tool::Action(ActionKind::ViewInventory) => "view_bot_inventory_tool",
            Tool::Action(ActionKind::MineBlock) => "mine_target_block_tool",
            Tool::Action(ActionKind::CraftItem) => "craft_target_item_tool",
            Tool::Action(ActionKind::PlaceBlock) => "place_item_block_tool",
            Tool::MemorizeRecipe => "memorize_recipe_tool",
            Tool::Delegate(role) => role.name(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::Action(ActionKind::InitializeBot) => "Connects the bot to the server.",
            Tool::Action(ActionKind::MoveTo) => "Walks the bot to block coordinates x, y, z.",
            Tool::Action(ActionKind::FindBlock) => concat!(
                "Finds the nearest block of block_type within max_distance ",
                "and returns its location."
            ),
            Tool::Action(ActionKind::ViewInventory) => "Lists the items the bot is carrying.",
            Tool::Action(ActionKind::MineBlock) => {
                "Mines the block_type block at x, y, z. Long-running: answers pending first."
            }
            Tool::Action(ActionKind::CraftItem) => {
                "Crafts quantity of item_name. Long-running: answers pending first."
            }
            Tool::Action(ActionKind::PlaceBlock) => concat!(
                "Places item_name against the reference block on the given face. ",
                "Long-running: answers pending first."
            ),
            Tool::MemorizeRecipe => {
                "Stores recipe_details (ingredients, quantity_produced) for item_name."
            }
            Tool::Delegate(role) => role.description(),
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::all().iter().copied().find(|tool| tool.name() == name)
    }

    /// Like [`Tool::from_name`], failing with `UnknownAction`.
    pub fn resolve(name: &str) -> GuildResult<Tool> {
        Tool::from_name(name).ok_or_else(|| GuildError::UnknownAction(name.to_string()))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flat placement arguments as the model sends them.
#[derive(Deserialize)]
struct FlatPlacement {
    item_name: String,
    ref_block_x: i32,
    ref_block_y: i32,
    ref_block_z: i32,
    face_vector_x: i32,
    face_vector_y: i32,
    face_vector_z: i32,
}

/// Turn tool-call arguments into a typed action.
///
/// Placement accepts either the flat `ref_block_*` / `face_vector_*`
/// form or nested `reference` and `face` objects.
pub fn action_from_args(kind: ActionKind, args: &Value) -> GuildResult<Action> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    if kind == ActionKind::PlaceBlock && args.get("ref_block_x").is_some() {
        let flat: FlatPlacement =
            serde_json::from_value(args).map_err(|e| GuildError::InvalidArguments {
                action: kind.wire_name().to_string(),
                reason: e.to_string(),
            })?;
        let nested = json!({
            "item_name": flat.item_name,
            "reference": {"x": flat.ref_block_x, "y": flat.ref_block_y, "z": flat.ref_block_z},
            "face": {"x": flat.face_vector_x, "y": flat.face_vector_y, "z": flat.face_vector_z},
        });
        return Action::from_args(kind, nested);
    }
    Action::from_args(kind, args)
}

/// Arguments of `memorize_recipe_tool`.
#[derive(Debug, Deserialize)]
pub struct MemorizeRecipeArgs {
    pub item_name: String,
    #[serde(default)]
    pub recipe_details: Value,
}

/// Arguments of a delegation tool.
#[derive(Debug, Deserialize)]
pub struct DelegationArgs {
    #[serde(alias = "task")]
    pub request: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::BlockLocation;

    #[test]
    fn test_name_lookup() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_name(tool.name()), Some(*tool));
        }
        assert_eq!(
            Tool::from_name("GathererAgent"),
            Some(Tool::Delegate(AgentRole::Gatherer))
        );
        assert_eq!(Tool::from_name("google_search"), None);
        let err = Tool::resolve("google_search").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");
        assert_eq!(err.to_string(), "Unknown action: google_search");
    }

    #[test]
    fn test_flat_placement_args() {
        let action = action_from_args(
            ActionKind::PlaceBlock,
            &json!({
                "item_name": "crafting_table",
                "ref_block_x": 10, "ref_block_y": 63, "ref_block_z": 5,
                "face_vector_x": 0, "face_vector_y": 1, "face_vector_z": 0
            }),
        )
        .unwrap();
        let Action::PlaceBlock(args) = action else {
            panic!("expected a placement");
        };
        assert_eq!(args.target(), BlockLocation::new(10, 64, 5));
    }

    #[test]
    fn test_missing_args_are_rejected() {
        let err = action_from_args(ActionKind::MineBlock, &json!({"block_type": "oak_log"}))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENTS");
        assert!(action_from_args(ActionKind::ViewInventory, &Value::Null).is_ok());
    }
}
