//! Session-scoped conversation state.
//!
//! The conversation loop is the only writer. It applies the effects of
//! synchronous calls as they return and the values carried by completion
//! events once they are delivered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::action::{Action, BlockLocation, ItemDetail};
use crate::error::{GuildError, GuildResult};
use crate::outcome::ActionPayload;

/// A crafting recipe remembered by the crafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub ingredients: BTreeMap<String, u32>,
    pub quantity_produced: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub crafting_table_needed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub inventory: BTreeMap<String, u32>,
    pub known_recipes: BTreeMap<String, Recipe>,
    pub placed_crafting_table_location: Option<BlockLocation>,
    pub placed_furnace_location: Option<BlockLocation>,
    pub resource_locations_memory: BTreeMap<String, Vec<BlockLocation>>,
    pub coordinator_plan_steps: Vec<String>,
    pub current_plan_step_index: usize,
    pub last_sub_task_result: Option<String>,
    pub current_high_level_goal: Option<String>,
    /// Final answers of each agent, keyed by the agent's output key.
    pub agent_outputs: BTreeMap<String, String>,
}

impl ConversationState {
    pub fn with_goal(goal: impl Into<String>) -> Self {
        Self {
            current_high_level_goal: Some(goal.into()),
            ..Self::default()
        }
    }

    pub fn with_plan(mut self, steps: Vec<String>) -> Self {
        self.coordinator_plan_steps = steps;
        self
    }

    pub fn item_count(&self, item: &str) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    fn add_items(&mut self, item: &str, count: u32) {
        *self.inventory.entry(item.to_string()).or_insert(0) += count;
    }

    fn take_item(&mut self, item: &str) {
        if let Some(count) = self.inventory.get_mut(item) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.inventory.remove(item);
            }
        }
    }

    fn replace_inventory(&mut self, items: &[ItemDetail]) {
        self.inventory.clear();
        for item in items {
            self.add_items(&item.name, item.count);
        }
    }

    /// Apply the effects of a successful action.
    ///
    /// `action` is the request that produced `payload`; it supplies values
    /// the worker may leave out (the placed item, the placement target).
    pub fn apply_success(&mut self, action: &Action, payload: &ActionPayload) {
        match (action, payload) {
            (_, ActionPayload::Inventory { items }) => self.replace_inventory(items),
            (Action::FindBlock(args), ActionPayload::BlockFound { location }) => {
                let known = self
                    .resource_locations_memory
                    .entry(args.block_type.clone())
                    .or_default();
                if !known.contains(location) {
                    known.push(*location);
                }
            }
            (Action::MineBlock(args), ActionPayload::Mined { collected_item }) => {
                let item = collected_item.as_deref().unwrap_or(&args.block_type);
                self.add_items(item, 1);
                if let Some(known) = self.resource_locations_memory.get_mut(&args.block_type) {
                    known.retain(|loc| *loc != args.at);
                }
            }
            (
                Action::CraftItem(args),
                ActionPayload::Crafted {
                    crafted_item,
                    quantity_crafted,
                },
            ) => {
                let item = crafted_item.as_deref().unwrap_or(&args.item_name);
                self.add_items(item, quantity_crafted.unwrap_or(args.quantity));
            }
            (Action::PlaceBlock(args), ActionPayload::Placed { placed_location }) => {
                let location = placed_location.unwrap_or_else(|| args.target());
                self.take_item(&args.item_name);
                match args.item_name.as_str() {
                    "crafting_table" => self.placed_crafting_table_location = Some(location),
                    "furnace" => self.placed_furnace_location = Some(location),
                    _ => {}
                }
            }
            _ => {}
        }
        debug!(action = %action, "Applied action effects to session state");
    }

    /// Store a recipe found by the crafter.
    ///
    /// `details` must carry at least `ingredients` and `quantity_produced`.
    pub fn memorize_recipe(&mut self, item_name: &str, details: &Value) -> GuildResult<&Recipe> {
        let has_required = details
            .as_object()
            .is_some_and(|o| o.contains_key("ingredients") && o.contains_key("quantity_produced"));
        if !has_required {
            return Err(GuildError::InvalidArguments {
                action: "memorize_recipe".to_string(),
                reason: "Recipe details malformed.".to_string(),
            });
        }
        let recipe: Recipe =
            serde_json::from_value(details.clone()).map_err(|e| GuildError::InvalidArguments {
                action: "memorize_recipe".to_string(),
                reason: e.to_string(),
            })?;
        self.known_recipes.insert(item_name.to_string(), recipe);
        Ok(&self.known_recipes[item_name])
    }

    /// Record the final answer of a delegated sub-task and advance the plan.
    pub fn record_sub_task_result(&mut self, result: impl Into<String>) {
        self.last_sub_task_result = Some(result.into());
        if self.current_plan_step_index < self.coordinator_plan_steps.len() {
            self.current_plan_step_index += 1;
        }
    }

    pub fn current_plan_step(&self) -> Option<&str> {
        self.coordinator_plan_steps
            .get(self.current_plan_step_index)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CraftItemArgs, FindBlockArgs, MineBlockArgs, PlaceBlockArgs};
    use serde_json::json;

    fn mine(block: &str, at: BlockLocation) -> Action {
        Action::MineBlock(MineBlockArgs {
            block_type: block.into(),
            at,
        })
    }

    #[test]
    fn test_found_then_mined() {
        let mut state = ConversationState::default();
        let at = BlockLocation::new(10, 64, 20);
        let find = Action::FindBlock(FindBlockArgs {
            block_type: "oak_log".into(),
            max_distance: 32,
        });
        state.apply_success(&find, &ActionPayload::BlockFound { location: at });
        state.apply_success(&find, &ActionPayload::BlockFound { location: at });
        assert_eq!(state.resource_locations_memory["oak_log"], vec![at]);

        state.apply_success(
            &mine("oak_log", at),
            &ActionPayload::Mined {
                collected_item: Some("oak_log".into()),
            },
        );
        assert_eq!(state.item_count("oak_log"), 1);
        assert!(state.resource_locations_memory["oak_log"].is_empty());
    }

    #[test]
    fn test_crafting_adds_quantity() {
        let mut state = ConversationState::default();
        let craft = Action::CraftItem(CraftItemArgs {
            item_name: "stick".into(),
            quantity: 4,
            recipe_shape: None,
            ingredients: None,
            crafting_table_needed: false,
        });
        state.apply_success(
            &craft,
            &ActionPayload::Crafted {
                crafted_item: None,
                quantity_crafted: None,
            },
        );
        assert_eq!(state.item_count("stick"), 4);
    }

    #[test]
    fn test_placing_crafting_table_remembers_location() {
        let mut state = ConversationState::default();
        state.inventory.insert("crafting_table".into(), 1);
        let place = Action::PlaceBlock(PlaceBlockArgs {
            item_name: "crafting_table".into(),
            reference: BlockLocation::new(1, 63, 1),
            face: BlockLocation::new(0, 1, 0),
        });
        state.apply_success(
            &place,
            &ActionPayload::Placed {
                placed_location: None,
            },
        );
        assert_eq!(
            state.placed_crafting_table_location,
            Some(BlockLocation::new(1, 64, 1))
        );
        assert_eq!(state.item_count("crafting_table"), 0);
    }

    #[test]
    fn test_inventory_snapshot_replaces() {
        let mut state = ConversationState::default();
        state.inventory.insert("dirt".into(), 3);
        state.apply_success(
            &Action::ViewInventory,
            &ActionPayload::Inventory {
                items: vec![ItemDetail {
                    name: "oak_log".into(),
                    count: 3,
                    item_type: 1,
                }],
            },
        );
        assert_eq!(state.item_count("dirt"), 0);
        assert_eq!(state.item_count("oak_log"), 3);
    }

    #[test]
    fn test_memorize_recipe() {
        let mut state = ConversationState::default();
        let recipe = state
            .memorize_recipe(
                "oak_planks",
                &json!({"ingredients": {"oak_log": 1}, "quantity_produced": 4}),
            )
            .unwrap();
        assert_eq!(recipe.quantity_produced, 4);
        assert!(!recipe.crafting_table_needed);

        let err = state
            .memorize_recipe("stick", &json!({"ingredients": {"oak_planks": 2}}))
            .unwrap_err();
        assert!(matches!(err, GuildError::InvalidArguments { .. }));
        assert!(!state.known_recipes.contains_key("stick"));
    }

    #[test]
    fn test_plan_progress() {
        let mut state = ConversationState::with_goal("craft 1 wooden_pickaxe")
            .with_plan(vec!["collect".into(), "craft".into()]);
        assert_eq!(state.current_plan_step(), Some("collect"));
        state.record_sub_task_result("collected 3 oak_log");
        assert_eq!(state.current_plan_step(), Some("craft"));
        state.record_sub_task_result("crafted");
        state.record_sub_task_result("extra");
        assert_eq!(state.current_plan_step_index, 2);
        assert_eq!(state.last_sub_task_result.as_deref(), Some("extra"));
    }
}
