//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identity of one connected player
pub type PlayerId = Uuid;

/// The two opposing teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Left-hand team, hosts the session
    Allies,
    /// Right-hand team, joins the session
    Axis,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Self::Allies => Self::Axis,
            Self::Axis => Self::Allies,
        }
    }
}

/// Horizontal facing of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// Unit direction along the x axis
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Weapon carried by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weapon {
    /// Accurate, slow firing
    #[default]
    Rifle,
    /// Rapid fire, wide spread
    Smg,
    /// Hard hitting, slowest cadence
    Heavy,
}

impl Weapon {
    /// Map a client-supplied weapon name. Unknown names select the heavy
    /// weapon; an empty name selects nothing.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "" => None,
            "rifle" => Some(Self::Rifle),
            "smg" => Some(Self::Smg),
            _ => Some(Self::Heavy),
        }
    }
}

/// Latest intent of one player, sent with every `input` message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InputSnapshot {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub jump: bool,
    #[serde(default)]
    pub crouch: bool,
    #[serde(default)]
    pub shoot: bool,
    #[serde(default)]
    pub grenade: bool,
    #[serde(default)]
    pub reload: bool,
    /// Requested weapon; `None` keeps the current one
    #[serde(default, deserialize_with = "weapon_choice")]
    pub weapon: Option<Weapon>,
}

/// Clients send `weapon` as a name, `null`, or `false`; only names count.
fn weapon_choice<'de, D>(deserializer: D) -> Result<Option<Weapon>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(name)) => Weapon::from_name(&name),
        _ => None,
    })
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a new session and wait for an opponent
    CreateSession,

    /// Join an existing session by its code
    JoinSession { code: String },

    /// Player intent for the current moment
    Input { input: InputSnapshot },

    /// Join any waiting session, or open one
    FindMatch,

    /// Keep-alive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Session opened, waiting for an opponent
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        code: String,
        player_id: PlayerId,
        side: Side,
    },

    /// Matchmaking opened a session and is waiting for an opponent
    #[serde(rename_all = "camelCase")]
    WaitingMatch {
        code: String,
        player_id: PlayerId,
        side: Side,
    },

    /// Matchmaking placed the player into an existing session
    MatchFound { code: String },

    /// Both players present, simulation running
    #[serde(rename_all = "camelCase")]
    GameStart {
        state: StateSnapshot,
        player_id: PlayerId,
        side: Side,
    },

    /// Request rejected
    Error { message: String },

    /// Full world snapshot, sent every tick
    State { state: StateSnapshot },

    /// A grenade detonated
    Explosion { x: f32, y: f32 },

    /// The other player disconnected
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    /// Keep-alive reply
    Pong,
}

/// Full world state as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub players: HashMap<PlayerId, PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub grenades: Vec<GrenadeSnapshot>,
    pub tick: u64,
    pub started: bool,
    pub world_width: f32,
    pub world_height: f32,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Health (0-100)
    pub health: f32,
    pub ammo: u32,
    pub grenades: u32,
    pub alive: bool,
    pub facing: Facing,
    pub in_trench: bool,
    pub crouching: bool,
    pub kills: u32,
    pub deaths: u32,
    pub weapon: Weapon,
    pub reloading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectileSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub owner: PlayerId,
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrenadeSnapshot {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub owner: PlayerId,
    /// Ticks until detonation
    pub timer: u32,
}
