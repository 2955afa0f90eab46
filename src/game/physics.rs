//! Per-tick movement integration for players and grenades
//!
//! All velocities are in world units per tick; there is no delta time.

use super::combat::Grenade;
use super::state::{PlayerState, WorldBounds, GROUND_Y};
use super::trench::TrenchMap;

/// Downward acceleration applied to players each tick
pub const PLAYER_GRAVITY: f32 = 0.4;
/// Players are kept this far from the world's side edges
pub const WORLD_MARGIN: f32 = 10.0;
/// Jumps are allowed from this height downward
pub const JUMP_THRESHOLD_Y: f32 = 390.0;

/// Downward acceleration applied to grenades each tick
pub const GRENADE_GRAVITY: f32 = 0.3;
/// Grenades settle slightly below the player ground line
pub const GRENADE_GROUND_Y: f32 = 410.0;
/// Fraction of vertical speed kept (and inverted) on a bounce
pub const GRENADE_RESTITUTION: f32 = 0.3;
/// Fraction of horizontal speed kept on a bounce
pub const GRENADE_GROUND_FRICTION: f32 = 0.7;
/// Fraction of horizontal speed kept every tick
pub const GRENADE_DRAG: f32 = 0.98;

/// Physics system for advancing bodies by one tick
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one alive player: integrate, fall, land, stay in bounds,
    /// then refresh trench cover.
    pub fn step_player(player: &mut PlayerState, world: &WorldBounds) {
        player.x += player.vx;
        player.vy += PLAYER_GRAVITY;
        player.y += player.vy;

        if player.y > GROUND_Y {
            player.y = GROUND_Y;
            player.vy = 0.0;
        }

        player.x = Self::clamp_x(player.x, world);
        player.in_trench = TrenchMap::is_in_trench(player.x, player.y);
    }

    /// Advance one grenade, bouncing off the ground
    pub fn step_grenade(grenade: &mut Grenade, world: &WorldBounds) {
        grenade.x += grenade.vx;
        grenade.vy += GRENADE_GRAVITY;
        grenade.y += grenade.vy;
        grenade.vx *= GRENADE_DRAG;

        if grenade.y > GRENADE_GROUND_Y {
            grenade.y = GRENADE_GROUND_Y;
            grenade.vy = -grenade.vy * GRENADE_RESTITUTION;
            grenade.vx *= GRENADE_GROUND_FRICTION;
        }

        grenade.x = Self::clamp_x(grenade.x, world);
    }

    fn clamp_x(x: f32, world: &WorldBounds) -> f32 {
        x.clamp(WORLD_MARGIN, world.width - WORLD_MARGIN)
    }

    /// Whether a player stands low enough to jump
    pub fn is_grounded(player: &PlayerState) -> bool {
        player.y >= JUMP_THRESHOLD_Y
    }
}
