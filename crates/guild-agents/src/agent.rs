//! Agent roles
//!
//! The team is fixed: a coordinator that only delegates, a gatherer that
//! moves, mines and places, and a crafter that crafts and remembers
//! recipes.

use guild_core::ActionKind;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prompts;
use crate::tools::Tool;

const COORDINATOR_TOOLS: &[Tool] = &[
    Tool::Delegate(AgentRole::Gatherer),
    Tool::Delegate(AgentRole::Crafter),
];

const GATHERER_TOOLS: &[Tool] = &[
    Tool::Action(ActionKind::FindBlock),
    Tool::Action(ActionKind::MoveTo),
    Tool::Action(ActionKind::MineBlock),
    Tool::Action(ActionKind::ViewInventory),
    Tool::Action(ActionKind::PlaceBlock),
];

const CRAFTER_TOOLS: &[Tool] = &[
    Tool::Action(ActionKind::CraftItem),
    Tool::Action(ActionKind::ViewInventory),
    Tool::MemorizeRecipe,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "CoordinatorAgent", alias = "coordinator")]
    Coordinator,
    #[serde(rename = "GathererAgent", alias = "gatherer")]
    Gatherer,
    #[serde(rename = "CrafterAgent", alias = "crafter")]
    Crafter,
}

impl AgentRole {
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => "CoordinatorAgent",
            AgentRole::Gatherer => "GathererAgent",
            AgentRole::Crafter => "CrafterAgent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => {
                "Coordinates Gatherer and Crafter agents to achieve high-level goals."
            }
            AgentRole::Gatherer => {
                "Collects resources like wood and stone, and can place blocks."
            }
            AgentRole::Crafter => "Crafts items and can memorize recipes.",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => prompts::COORDINATOR_INSTRUCTION,
            AgentRole::Gatherer => prompts::GATHERER_INSTRUCTION,
            AgentRole::Crafter => prompts::CRAFTER_INSTRUCTION,
        }
    }

    /// Session state key the role's final answer is stored under.
    pub fn output_key(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator_status",
            AgentRole::Gatherer => "gatherer_status",
            AgentRole::Crafter => "crafter_status",
        }
    }

    /// Tools the role may call.
    pub fn tools(&self) -> &'static [Tool] {
        match self {
            AgentRole::Coordinator => COORDINATOR_TOOLS,
            AgentRole::Gatherer => GATHERER_TOOLS,
            AgentRole::Crafter => CRAFTER_TOOLS,
        }
    }

    pub fn can_use(&self, tool: Tool) -> bool {
        self.tools().contains(&tool)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [AgentRole::Coordinator, AgentRole::Gatherer, AgentRole::Crafter]
            .into_iter()
            .find(|role| role.name() == name)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_assignment() {
        assert!(AgentRole::Coordinator.can_use(Tool::Delegate(AgentRole::Crafter)));
        assert!(!AgentRole::Coordinator.can_use(Tool::Action(ActionKind::MineBlock)));
        assert!(AgentRole::Gatherer.can_use(Tool::Action(ActionKind::PlaceBlock)));
        assert!(!AgentRole::Gatherer.can_use(Tool::MemorizeRecipe));
        assert!(AgentRole::Crafter.can_use(Tool::MemorizeRecipe));
    }

    #[test]
    fn test_names_and_keys() {
        assert_eq!(AgentRole::from_name("GathererAgent"), Some(AgentRole::Gatherer));
        assert_eq!(AgentRole::from_name("Gatherer"), None);
        assert_eq!(AgentRole::Crafter.output_key(), "crafter_status");
        let role: AgentRole = serde_json::from_str("\"coordinator\"").unwrap();
        assert_eq!(role, AgentRole::Coordinator);
    }
}
