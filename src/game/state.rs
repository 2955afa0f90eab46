//! Authoritative per-session world state

use tokio::time::Instant;

use crate::ws::protocol::{Facing, PlayerId, Side, Weapon};

use super::combat::{Grenade, Projectile};

/// Maximum (and respawn) health
pub const MAX_HEALTH: f32 = 100.0;
/// Magazine capacity
pub const AMMO_CAPACITY: u32 = 30;
/// Grenades carried at spawn
pub const GRENADE_CAPACITY: u32 = 3;
/// Height of the ground line; larger y is lower on screen
pub const GROUND_Y: f32 = 400.0;

/// World dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 600.0,
        }
    }
}

impl WorldBounds {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// Spawn point for a team
pub fn spawn_point(side: Side) -> (f32, f32) {
    match side {
        Side::Allies => (120.0, GROUND_Y),
        Side::Axis => (1480.0, GROUND_Y),
    }
}

/// Player state in a session (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub side: Side,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: Facing,
    pub crouching: bool,
    /// Recomputed every tick from the trench map
    pub in_trench: bool,

    // Combat
    pub health: f32,
    pub ammo: u32,
    pub grenades: u32,
    pub alive: bool,
    pub weapon: Weapon,
    pub reloading: bool,
    pub last_shot: Option<Instant>,

    // Stats
    pub kills: u32,
    pub deaths: u32,
}

impl PlayerState {
    /// Fresh player at the team spawn, facing the enemy
    pub fn new(id: PlayerId, side: Side) -> Self {
        let (x, y) = spawn_point(side);
        Self {
            id,
            side,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            facing: match side {
                Side::Allies => Facing::Right,
                Side::Axis => Facing::Left,
            },
            crouching: false,
            in_trench: false,
            health: MAX_HEALTH,
            ammo: AMMO_CAPACITY,
            grenades: GRENADE_CAPACITY,
            alive: true,
            weapon: Weapon::default(),
            reloading: false,
            last_shot: None,
            kills: 0,
            deaths: 0,
        }
    }

    /// Subtract health, flooring at zero. Returns true if this blow was fatal.
    pub fn take_damage(&mut self, damage: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - damage).clamp(0.0, MAX_HEALTH);
        if self.health <= 0.0 {
            self.alive = false;
            self.deaths += 1;
            true
        } else {
            false
        }
    }

    /// Restore vitals and move back to the team spawn
    pub fn respawn(&mut self) {
        let (x, y) = spawn_point(self.side);
        self.alive = true;
        self.health = MAX_HEALTH;
        self.ammo = AMMO_CAPACITY;
        self.grenades = GRENADE_CAPACITY;
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
    }
}

/// Session world state (owned by the session task)
#[derive(Debug, Default)]
pub struct SessionState {
    /// Players in join order; hit detection walks this order
    pub players: Vec<PlayerState>,
    pub projectiles: Vec<Projectile>,
    pub grenades: Vec<Grenade>,
    pub tick: u64,
    pub started: bool,
    pub world: WorldBounds,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player. Returns false if the identity is already present.
    pub fn insert_player(&mut self, player: PlayerState) -> bool {
        if self.contains(player.id) {
            return false;
        }
        self.players.push(player);
        true
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(idx))
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    #[cfg(test)]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == id)
    }
}
