//! Worker actions and their wire representation.
//!
//! Each action has a wire name understood by the worker and a fixed
//! invocation mode. Quick queries resolve synchronously; anything that
//! takes game time (digging, crafting, placing) is long-running and
//! completes out of band.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{GuildError, GuildResult};

/// How the gateway waits for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// The worker's reply is the terminal result.
    Sync,
    /// The worker acknowledges with a pending marker and completes later.
    Async,
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::Sync => write!(f, "sync"),
            InvocationMode::Async => write!(f, "async"),
        }
    }
}

/// Strongly-typed action discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    InitializeBot,
    MoveTo,
    FindBlock,
    ViewInventory,
    MineBlock,
    CraftItem,
    PlaceBlock,
}

impl ActionKind {
    /// Name of the action on the worker side.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActionKind::InitializeBot => "initialize_bot",
            ActionKind::MoveTo => "go_to_xyz",
            ActionKind::FindBlock => "find_block",
            ActionKind::ViewInventory => "get_inventory",
            ActionKind::MineBlock => "mine_block",
            ActionKind::CraftItem => "craft_item",
            ActionKind::PlaceBlock => "place_block",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.wire_name() == name)
    }

    /// Invocation mode used for this action.
    pub fn mode(&self) -> InvocationMode {
        match self {
            ActionKind::InitializeBot
            | ActionKind::MoveTo
            | ActionKind::FindBlock
            | ActionKind::ViewInventory => InvocationMode::Sync,
            ActionKind::MineBlock | ActionKind::CraftItem | ActionKind::PlaceBlock => {
                InvocationMode::Async
            }
        }
    }

    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::InitializeBot,
            ActionKind::MoveTo,
            ActionKind::FindBlock,
            ActionKind::ViewInventory,
            ActionKind::MineBlock,
            ActionKind::CraftItem,
            ActionKind::PlaceBlock,
        ]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// X, Y, Z coordinates of a block in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockLocation {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockLocation {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring position reached by stepping along `face`.
    ///
    /// Coordinates come from the model unchecked and saturate at the
    /// `i32` bounds.
    pub fn offset(&self, face: &BlockLocation) -> BlockLocation {
        BlockLocation::new(
            self.x.saturating_add(face.x),
            self.y.saturating_add(face.y),
            self.z.saturating_add(face.z),
        )
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One inventory slot as reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub name: String,
    pub count: u32,
    #[serde(rename = "type")]
    pub item_type: u32,
}

/// Connection options for spawning the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_teleport_coords: Option<[i32; 3]>,
}

fn default_search_distance() -> u32 {
    32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindBlockArgs {
    pub block_type: String,
    #[serde(default = "default_search_distance")]
    pub max_distance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineBlockArgs {
    pub block_type: String,
    #[serde(flatten)]
    pub at: BlockLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftItemArgs {
    pub item_name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_shape: Option<Vec<Vec<Option<String>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    pub crafting_table_needed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBlockArgs {
    pub item_name: String,
    /// Block the new one is placed against.
    pub reference: BlockLocation,
    /// Face of the reference block, e.g. (0, 1, 0) for its top.
    pub face: BlockLocation,
}

impl PlaceBlockArgs {
    pub fn target(&self) -> BlockLocation {
        self.reference.offset(&self.face)
    }
}

/// A request for the worker to do something in the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InitializeBot(BotOptions),
    MoveTo(BlockLocation),
    FindBlock(FindBlockArgs),
    ViewInventory,
    MineBlock(MineBlockArgs),
    CraftItem(CraftItemArgs),
    PlaceBlock(PlaceBlockArgs),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::InitializeBot(_) => ActionKind::InitializeBot,
            Action::MoveTo(_) => ActionKind::MoveTo,
            Action::FindBlock(_) => ActionKind::FindBlock,
            Action::ViewInventory => ActionKind::ViewInventory,
            Action::MineBlock(_) => ActionKind::MineBlock,
            Action::CraftItem(_) => ActionKind::CraftItem,
            Action::PlaceBlock(_) => ActionKind::PlaceBlock,
        }
    }

    pub fn mode(&self) -> InvocationMode {
        self.kind().mode()
    }

    /// Serialize the arguments for the worker request.
    pub fn args(&self) -> GuildResult<Value> {
        let value = match self {
            Action::InitializeBot(options) => serde_json::to_value(options)?,
            Action::MoveTo(target) => serde_json::to_value(target)?,
            Action::FindBlock(args) => serde_json::to_value(args)?,
            Action::ViewInventory => Value::Object(Default::default()),
            Action::MineBlock(args) => serde_json::to_value(args)?,
            Action::CraftItem(args) => serde_json::to_value(args)?,
            Action::PlaceBlock(args) => serde_json::to_value(args)?,
        };
        Ok(value)
    }

    /// Build an action from its kind and JSON arguments.
    ///
    /// Tool calls arrive from the decision model as loosely-typed JSON;
    /// this is where they become typed actions.
    pub fn from_args(kind: ActionKind, args: Value) -> GuildResult<Self> {
        let invalid = |e: serde_json::Error| GuildError::InvalidArguments {
            action: kind.wire_name().to_string(),
            reason: e.to_string(),
        };
        let action = match kind {
            ActionKind::InitializeBot => {
                Action::InitializeBot(serde_json::from_value(args).map_err(invalid)?)
            }
            ActionKind::MoveTo => Action::MoveTo(serde_json::from_value(args).map_err(invalid)?),
            ActionKind::FindBlock => {
                Action::FindBlock(serde_json::from_value(args).map_err(invalid)?)
            }
            ActionKind::ViewInventory => Action::ViewInventory,
            ActionKind::MineBlock => {
                Action::MineBlock(serde_json::from_value(args).map_err(invalid)?)
            }
            ActionKind::CraftItem => {
                Action::CraftItem(serde_json::from_value(args).map_err(invalid)?)
            }
            ActionKind::PlaceBlock => {
                Action::PlaceBlock(serde_json::from_value(args).map_err(invalid)?)
            }
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::InitializeBot(o) => {
                write!(f, "initialize_bot({}@{}:{})", o.username, o.host, o.port)
            }
            Action::MoveTo(t) => write!(f, "go_to_xyz{}", t),
            Action::FindBlock(a) => write!(f, "find_block({}, {})", a.block_type, a.max_distance),
            Action::ViewInventory => write!(f, "get_inventory()"),
            Action::MineBlock(a) => write!(f, "mine_block({} at {})", a.block_type, a.at),
            Action::CraftItem(a) => write!(f, "craft_item({} x{})", a.item_name, a.quantity),
            Action::PlaceBlock(a) => write!(f, "place_block({} at {})", a.item_name, a.target()),
        }
    }
}
