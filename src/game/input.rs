//! Applies one player's latest input snapshot to the session world

use rand::Rng;
use tokio::time::Instant;

use crate::ws::protocol::{Facing, InputSnapshot, PlayerId};

use super::combat::{CombatSystem, Grenade, Projectile, WeaponStats};
use super::physics::PhysicsSystem;
use super::state::{SessionState, AMMO_CAPACITY};

/// Walking speed in units per tick
pub const WALK_SPEED: f32 = 3.0;
/// Crouched walking speed
pub const CROUCH_SPEED: f32 = 1.5;
/// Vertical velocity given by a jump
pub const JUMP_VELOCITY: f32 = -8.0;

/// What an input changed beyond the player's own fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEffects {
    pub fired: bool,
    pub threw_grenade: bool,
    /// Caller must schedule the reload completion
    pub reload_started: bool,
}

pub struct InputProcessor;

impl InputProcessor {
    /// Apply `input` for `player_id` at time `now`. Unknown or dead players
    /// are ignored entirely.
    pub fn apply<R: Rng>(
        state: &mut SessionState,
        player_id: PlayerId,
        input: &InputSnapshot,
        now: Instant,
        rng: &mut R,
    ) -> InputEffects {
        let mut effects = InputEffects::default();
        let SessionState {
            players,
            projectiles,
            grenades,
            ..
        } = state;
        let Some(player) = players.iter_mut().find(|p| p.id == player_id) else {
            return effects;
        };
        if !player.alive {
            return effects;
        }

        player.crouching = input.crouch;
        let speed = if player.crouching {
            CROUCH_SPEED
        } else {
            WALK_SPEED
        };

        if input.left {
            player.vx = -speed;
            player.facing = Facing::Left;
        } else if input.right {
            player.vx = speed;
            player.facing = Facing::Right;
        } else {
            player.vx = 0.0;
        }

        if input.jump && PhysicsSystem::is_grounded(player) {
            player.vy = JUMP_VELOCITY;
        }

        if input.shoot {
            let stats = WeaponStats::for_weapon(player.weapon);
            let since_last = player.last_shot.map(|t| now.saturating_duration_since(t));
            if CombatSystem::can_fire(&stats, since_last) && player.ammo > 0 && !player.reloading {
                player.last_shot = Some(now);
                player.ammo -= 1;
                projectiles.push(Projectile::fire(player, rng));
                effects.fired = true;
            }
        }

        if input.grenade && player.grenades > 0 {
            player.grenades -= 1;
            grenades.push(Grenade::throw(player));
            effects.threw_grenade = true;
        }

        if input.reload && player.ammo < AMMO_CAPACITY && !player.reloading {
            player.reloading = true;
            effects.reload_started = true;
        }

        if let Some(weapon) = input.weapon {
            player.weapon = weapon;
        }

        effects
    }
}
