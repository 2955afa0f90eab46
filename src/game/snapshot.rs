//! Snapshot building for network transmission

use crate::ws::protocol::{GrenadeSnapshot, PlayerSnapshot, ProjectileSnapshot, StateSnapshot};

use super::combat::{Grenade, Projectile};
use super::state::{PlayerState, SessionState};

/// Builds full-state snapshots
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build a snapshot of the whole session world
    pub fn build(state: &SessionState) -> StateSnapshot {
        StateSnapshot {
            players: state
                .players
                .iter()
                .map(|p| (p.id, Self::player(p)))
                .collect(),
            projectiles: state.projectiles.iter().map(Self::projectile).collect(),
            grenades: state.grenades.iter().map(Self::grenade).collect(),
            tick: state.tick,
            started: state.started,
            world_width: state.world.width,
            world_height: state.world.height,
        }
    }

    fn player(p: &PlayerState) -> PlayerSnapshot {
        PlayerSnapshot {
            id: p.id,
            side: p.side,
            x: p.x,
            y: p.y,
            vx: p.vx,
            vy: p.vy,
            health: p.health,
            ammo: p.ammo,
            grenades: p.grenades,
            alive: p.alive,
            facing: p.facing,
            in_trench: p.in_trench,
            crouching: p.crouching,
            kills: p.kills,
            deaths: p.deaths,
            weapon: p.weapon,
            reloading: p.reloading,
        }
    }

    fn projectile(p: &Projectile) -> ProjectileSnapshot {
        ProjectileSnapshot {
            x: p.x,
            y: p.y,
            vx: p.vx,
            vy: p.vy,
            owner: p.owner_id,
            damage: p.damage,
        }
    }

    fn grenade(g: &Grenade) -> GrenadeSnapshot {
        GrenadeSnapshot {
            x: g.x,
            y: g.y,
            vx: g.vx,
            vy: g.vy,
            owner: g.owner_id,
            timer: g.timer,
        }
    }
}
