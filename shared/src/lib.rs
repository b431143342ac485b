use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codec;

/// Width and height of every board, in cells. Coordinates run from 1 to
/// `BOARD_SIZE` inclusive on both axes.
pub const BOARD_SIZE: i32 = 14;
/// Anchor value of a vessel that has not been placed yet.
pub const UNPLACED: i32 = -1;
/// Longest chat line relayed to a room.
pub const MAX_CHAT_LENGTH: usize = 256;

pub type ClientId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Packet {
    Join {
        room: String,
    },
    Ready {
        vessels: Vec<VesselPlacement>,
        ready: bool,
    },
    Attack {
        #[serde(rename = "attackerId")]
        attacker_id: ClientId,
        x: i32,
        y: i32,
        ordinance: OrdinanceKind,
    },
    Chat {
        text: String,
    },
    Disconnect,

    Connected {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    StateUpdate(ViewerState),
    Disconnected {
        reason: String,
    },
}

/// Direction a vessel faces. Encoded on the wire as 0 to 3.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum Heading {
    /// +x
    East,
    /// +y
    South,
    /// -x
    West,
    /// -y
    North,
}

impl Heading {
    pub fn reversed(self) -> Heading {
        match self {
            Heading::East => Heading::West,
            Heading::South => Heading::North,
            Heading::West => Heading::East,
            Heading::North => Heading::South,
        }
    }

    /// Unit step `(dx, dy)` from the anchor towards the stern.
    pub fn step(self) -> (i32, i32) {
        match self {
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
            Heading::North => (0, -1),
        }
    }
}

impl From<Heading> for u8 {
    fn from(heading: Heading) -> u8 {
        match heading {
            Heading::East => 0,
            Heading::South => 1,
            Heading::West => 2,
            Heading::North => 3,
        }
    }
}

impl TryFrom<u8> for Heading {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Heading::East),
            1 => Ok(Heading::South),
            2 => Ok(Heading::West),
            3 => Ok(Heading::North),
            other => Err(format!("heading must be 0-3, got {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrdinanceKind {
    Standard,
    Area,
    Reconnaissance,
}

impl OrdinanceKind {
    /// Limited kinds may be used once per match.
    pub fn is_limited(self) -> bool {
        !matches!(self, OrdinanceKind::Standard)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrdinanceKind::Standard => "standard",
            OrdinanceKind::Area => "area",
            OrdinanceKind::Reconnaissance => "reconnaissance",
        }
    }
}

impl fmt::Display for OrdinanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Observer,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Placement,
    Play,
    GameOver,
}

/// One resolved attack outcome. Shots are never modified after creation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub x: i32,
    pub y: i32,
    pub turn_number: u32,
    pub hit: bool,
    pub sunk: Vec<String>,
}

impl Shot {
    pub fn new(x: i32, y: i32, turn_number: u32) -> Self {
        Self {
            x,
            y,
            turn_number,
            hit: false,
            sunk: Vec::new(),
        }
    }
}

/// Client-submitted position for one named vessel. Only these fields are
/// ever read from a ready-up request; anything else the client sends is
/// dropped during decoding.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VesselPlacement {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub heading: Heading,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VesselState {
    pub x: i32,
    pub y: i32,
    pub name: String,
    pub heading: Heading,
    pub hits: Vec<bool>,
    pub speed: i32,
    pub length: i32,
    pub sprite: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CombatantView {
    pub id: ClientId,
    pub vessels: Vec<VesselState>,
    pub shots: Vec<Shot>,
    pub slot_number: Option<u8>,
    pub intel: Vec<Shot>,
    pub depleted_ordinance: Vec<OrdinanceKind>,
    pub is_turn: bool,
    pub is_winner: bool,
}

/// Snapshot of an engagement as one connection is allowed to see it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub turn_number: u32,
    pub mode: Mode,
    pub board_size: i32,
    pub player_state: CombatantView,
    /// Both players' views by seat, only present for observers. An empty
    /// seat is `None`, so index 0 is always player 1 and index 1 player 2.
    pub observation_state: Option<Vec<Option<CombatantView>>>,
}
