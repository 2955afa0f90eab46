//! Combat system - weapons, projectiles, grenades, damage

use std::time::Duration;

use rand::Rng;

use crate::ws::protocol::{PlayerId, Weapon};

use super::physics::PhysicsSystem;
use super::state::{PlayerState, SessionState, WorldBounds};

/// Projectile speed in units per tick
pub const PROJECTILE_SPEED: f32 = 12.0;
/// Half-width of a player's hit-box
pub const HITBOX_HALF_WIDTH: f32 = 8.0;
/// Full hit-box height standing; crouching halves it
pub const HITBOX_HEIGHT: f32 = 24.0;
pub const CROUCH_HITBOX_HEIGHT: f32 = 12.0;

/// Grenade launch velocity
pub const GRENADE_THROW_VX: f32 = 5.0;
pub const GRENADE_THROW_VY: f32 = -6.0;
/// Grenade fuse in ticks (4s at 30 Hz)
pub const GRENADE_FUSE_TICKS: u32 = 120;
/// Blast radius and damage at the centre
pub const EXPLOSION_RADIUS: f32 = 80.0;
pub const EXPLOSION_MAX_DAMAGE: f32 = 80.0;

/// Damage multiplier for a standing target in a trench
pub const TRENCH_DAMAGE_FACTOR: f32 = 0.5;

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Minimum time between shots
    pub cooldown: Duration,
    /// Maximum vertical velocity perturbation, either direction
    pub spread: f32,
}

impl WeaponStats {
    pub fn for_weapon(weapon: Weapon) -> Self {
        match weapon {
            Weapon::Rifle => Self {
                damage: 35.0,
                cooldown: Duration::from_millis(600),
                spread: 0.25,
            },
            Weapon::Smg => Self {
                damage: 12.0,
                cooldown: Duration::from_millis(150),
                spread: 1.5,
            },
            Weapon::Heavy => Self {
                damage: 50.0,
                cooldown: Duration::from_millis(800),
                spread: 0.25,
            },
        }
    }
}

/// Active projectile in the world
#[derive(Debug, Clone)]
pub struct Projectile {
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
}

impl Projectile {
    /// Fire from a player's muzzle along their facing
    pub fn fire<R: Rng>(shooter: &PlayerState, rng: &mut R) -> Self {
        let stats = WeaponStats::for_weapon(shooter.weapon);
        let dir = shooter.facing.sign();
        let muzzle_height = if shooter.crouching { 5.0 } else { 12.0 };
        Self {
            owner_id: shooter.id,
            x: shooter.x + dir * 10.0,
            y: shooter.y - muzzle_height,
            vx: PROJECTILE_SPEED * dir,
            vy: rng.gen_range(-stats.spread..=stats.spread),
            damage: stats.damage,
        }
    }

    /// Move one tick; returns false once outside the world
    pub fn update(&mut self, world: &WorldBounds) -> bool {
        self.x += self.vx;
        self.y += self.vy;
        world.contains(self.x, self.y)
    }

    /// Check collision with a target
    pub fn check_hit(&self, target: &PlayerState) -> bool {
        if !target.alive || target.id == self.owner_id {
            return false;
        }
        let height = if target.crouching {
            CROUCH_HITBOX_HEIGHT
        } else {
            HITBOX_HEIGHT
        };
        let half = height / 2.0;
        let centre_y = target.y - half;
        (self.x - target.x).abs() < HITBOX_HALF_WIDTH && (self.y - centre_y).abs() < half
    }
}

/// Live grenade in the world
#[derive(Debug, Clone)]
pub struct Grenade {
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Ticks until detonation
    pub timer: u32,
    pub exploded: bool,
}

impl Grenade {
    /// Lob from a player's hand along their facing
    pub fn throw(thrower: &PlayerState) -> Self {
        let dir = thrower.facing.sign();
        Self {
            owner_id: thrower.id,
            x: thrower.x + dir * 10.0,
            y: thrower.y - 20.0,
            vx: GRENADE_THROW_VX * dir,
            vy: GRENADE_THROW_VY,
            timer: GRENADE_FUSE_TICKS,
            exploded: false,
        }
    }
}

/// Something the tick loop must react to
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    /// A player's health reached zero
    Kill {
        /// Credited player; `None` for self-inflicted deaths
        killer_id: Option<PlayerId>,
        victim_id: PlayerId,
    },
    /// A grenade went off
    Explosion { x: f32, y: f32 },
}

/// Combat system for resolving hits and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a weapon is off cooldown
    pub fn can_fire(stats: &WeaponStats, since_last_shot: Option<Duration>) -> bool {
        since_last_shot.map_or(true, |elapsed| elapsed > stats.cooldown)
    }

    /// Projectile damage after trench cover. Crouching already shrinks the
    /// hit-box, so trench cover only protects standing targets.
    pub fn projectile_damage(raw: f32, target: &PlayerState) -> f32 {
        if target.in_trench && !target.crouching {
            raw * TRENCH_DAMAGE_FACTOR
        } else {
            raw
        }
    }

    /// Linear blast falloff, zero at and beyond the radius
    pub fn explosion_damage(distance: f32) -> f32 {
        if distance >= EXPLOSION_RADIUS {
            return 0.0;
        }
        (EXPLOSION_MAX_DAMAGE * (1.0 - distance / EXPLOSION_RADIUS)).floor()
    }

    /// Damage the player at `victim_idx`, crediting a kill to `attacker`
    /// unless it is the victim.
    fn inflict(
        players: &mut [PlayerState],
        victim_idx: usize,
        damage: f32,
        attacker: PlayerId,
    ) -> Option<CombatEvent> {
        let victim = &mut players[victim_idx];
        if !victim.take_damage(damage) {
            return None;
        }

        let victim_id = victim.id;
        let killer_id = (attacker != victim_id).then_some(attacker);
        if let Some(killer_id) = killer_id {
            // The shooter may have disconnected while the shot was in flight
            if let Some(killer) = players.iter_mut().find(|p| p.id == killer_id) {
                killer.kills += 1;
            }
        }

        Some(CombatEvent::Kill {
            killer_id,
            victim_id,
        })
    }

    /// Move projectiles, drop those out of bounds, resolve hits.
    /// The first player in join order that overlaps a projectile takes it.
    pub fn advance_projectiles(state: &mut SessionState) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let world = state.world;
        let players = &mut state.players;

        state.projectiles.retain_mut(|projectile| {
            if !projectile.update(&world) {
                return false;
            }

            let Some(idx) = players.iter().position(|p| projectile.check_hit(p)) else {
                return true;
            };

            let damage = Self::projectile_damage(projectile.damage, &players[idx]);
            events.extend(Self::inflict(players.as_mut_slice(), idx, damage, projectile.owner_id));
            false
        });

        events
    }

    /// Move grenades, count down fuses, detonate expired ones
    pub fn advance_grenades(state: &mut SessionState) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let world = state.world;
        let players = &mut state.players;

        state.grenades.retain_mut(|grenade| {
            if grenade.exploded {
                return false;
            }

            PhysicsSystem::step_grenade(grenade, &world);
            grenade.timer = grenade.timer.saturating_sub(1);
            if grenade.timer > 0 {
                return true;
            }

            grenade.exploded = true;
            for idx in 0..players.len() {
                let target = &players[idx];
                if !target.alive {
                    continue;
                }
                let distance = (target.x - grenade.x).hypot(target.y - grenade.y);
                let damage = Self::explosion_damage(distance);
                if damage > 0.0 {
                    events.extend(Self::inflict(
                        players.as_mut_slice(),
                        idx,
                        damage,
                        grenade.owner_id,
                    ));
                }
            }

            events.push(CombatEvent::Explosion {
                x: grenade.x,
                y: grenade.y,
            });
            false
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Facing, Side};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn duel() -> (SessionState, PlayerId, PlayerId) {
        let mut state = SessionState::new();
        let shooter = Uuid::new_v4();
        let target = Uuid::new_v4();
        state.insert_player(PlayerState::new(shooter, Side::Allies));
        state.insert_player(PlayerState::new(target, Side::Axis));
        (state, shooter, target)
    }

    /// A projectile that lands on `target` (standing at ground level) next tick
    fn shot_at(state: &SessionState, owner: PlayerId, target: PlayerId, damage: f32) -> Projectile {
        let t = state.player(target).unwrap();
        Projectile {
            owner_id: owner,
            x: t.x - PROJECTILE_SPEED,
            y: t.y - 15.0,
            vx: PROJECTILE_SPEED,
            vy: 0.0,
            damage,
        }
    }

    #[test]
    fn weapon_table() {
        let rifle = WeaponStats::for_weapon(Weapon::Rifle);
        let smg = WeaponStats::for_weapon(Weapon::Smg);
        let heavy = WeaponStats::for_weapon(Weapon::Heavy);
        assert_eq!((rifle.damage, rifle.cooldown.as_millis()), (35.0, 600));
        assert_eq!((smg.damage, smg.cooldown.as_millis()), (12.0, 150));
        assert_eq!((heavy.damage, heavy.cooldown.as_millis()), (50.0, 800));
        assert!(smg.spread > rifle.spread);
    }

    #[test]
    fn cooldown_is_strict() {
        let rifle = WeaponStats::for_weapon(Weapon::Rifle);
        assert!(CombatSystem::can_fire(&rifle, None));
        assert!(!CombatSystem::can_fire(&rifle, Some(Duration::from_millis(599))));
        assert!(!CombatSystem::can_fire(&rifle, Some(Duration::from_millis(600))));
        assert!(CombatSystem::can_fire(&rifle, Some(Duration::from_millis(601))));
    }

    #[test]
    fn fired_projectile_follows_facing_within_spread() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut shooter = PlayerState::new(Uuid::new_v4(), Side::Axis);
        shooter.weapon = Weapon::Smg;

        for _ in 0..50 {
            let p = Projectile::fire(&shooter, &mut rng);
            assert_eq!(p.vx, -PROJECTILE_SPEED);
            assert_eq!(p.x, shooter.x - 10.0);
            assert_eq!(p.y, shooter.y - 12.0);
            assert!(p.vy.abs() <= 1.5);
            assert_eq!(p.damage, 12.0);
        }

        shooter.weapon = Weapon::Rifle;
        shooter.crouching = true;
        shooter.facing = Facing::Right;
        let p = Projectile::fire(&shooter, &mut rng);
        assert_eq!(p.vx, PROJECTILE_SPEED);
        assert_eq!(p.y, shooter.y - 5.0);
        assert!(p.vy.abs() <= 0.25);
    }

    #[test]
    fn projectile_hit_deals_weapon_damage() {
        let (mut state, shooter, target) = duel();
        let shot = shot_at(&state, shooter, target, 35.0);
        state.projectiles.push(shot);

        let events = CombatSystem::advance_projectiles(&mut state);
        assert!(events.is_empty());
        assert!(state.projectiles.is_empty());
        assert_eq!(state.player(target).unwrap().health, 65.0);
    }

    #[test]
    fn projectile_ignores_its_owner() {
        let (mut state, shooter, _) = duel();
        let shot = shot_at(&state, shooter, shooter, 35.0);
        state.projectiles.push(shot);

        CombatSystem::advance_projectiles(&mut state);
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.player(shooter).unwrap().health, 100.0);
    }

    #[test]
    fn projectile_leaving_world_is_removed() {
        let (mut state, shooter, _) = duel();
        state.projectiles.push(Projectile {
            owner_id: shooter,
            x: 1595.0,
            y: 300.0,
            vx: PROJECTILE_SPEED,
            vy: 0.0,
            damage: 35.0,
        });
        CombatSystem::advance_projectiles(&mut state);
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn standing_in_trench_halves_damage() {
        let (mut state, shooter, target) = duel();
        state.player_mut(target).unwrap().in_trench = true;
        let shot = shot_at(&state, shooter, target, 35.0);
        state.projectiles.push(shot);

        CombatSystem::advance_projectiles(&mut state);
        assert_eq!(state.player(target).unwrap().health, 100.0 - 17.5);
    }

    #[test]
    fn crouching_in_trench_takes_full_damage_on_smaller_hitbox() {
        let (mut state, shooter, target) = duel();
        {
            let t = state.player_mut(target).unwrap();
            t.in_trench = true;
            t.crouching = true;
        }

        // Chest height misses a crouching target
        let high = shot_at(&state, shooter, target, 35.0);
        let mut low = high.clone();
        low.y = state.player(target).unwrap().y - 3.0;
        state.projectiles.push(high);
        CombatSystem::advance_projectiles(&mut state);
        assert_eq!(state.player(target).unwrap().health, 100.0);

        state.projectiles.clear();
        state.projectiles.push(low);
        CombatSystem::advance_projectiles(&mut state);
        assert_eq!(state.player(target).unwrap().health, 65.0);
    }

    #[test]
    fn lethal_hit_credits_shooter() {
        let (mut state, shooter, target) = duel();
        state.player_mut(target).unwrap().health = 10.0;
        let shot = shot_at(&state, shooter, target, 35.0);
        state.projectiles.push(shot);

        let events = CombatSystem::advance_projectiles(&mut state);
        assert_eq!(
            events,
            vec![CombatEvent::Kill {
                killer_id: Some(shooter),
                victim_id: target
            }]
        );
        let victim = state.player(target).unwrap();
        assert_eq!(victim.health, 0.0);
        assert!(!victim.alive);
        assert_eq!(victim.deaths, 1);
        assert_eq!(state.player(shooter).unwrap().kills, 1);
    }

    #[test]
    fn dead_players_are_not_hit() {
        let (mut state, shooter, target) = duel();
        state.player_mut(target).unwrap().take_damage(100.0);
        let shot = shot_at(&state, shooter, target, 35.0);
        state.projectiles.push(shot);

        let events = CombatSystem::advance_projectiles(&mut state);
        assert!(events.is_empty());
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.player(target).unwrap().deaths, 1);
    }

    #[test]
    fn first_player_in_join_order_absorbs_the_shot() {
        let (mut state, shooter, first) = duel();
        let second = Uuid::new_v4();
        let mut blocker = PlayerState::new(second, Side::Axis);
        blocker.x = state.player(first).unwrap().x;
        state.insert_player(blocker);

        let shot = shot_at(&state, shooter, first, 35.0);
        state.projectiles.push(shot);
        CombatSystem::advance_projectiles(&mut state);

        assert_eq!(state.player(first).unwrap().health, 65.0);
        assert_eq!(state.player(second).unwrap().health, 100.0);
    }

    #[test]
    fn explosion_falloff() {
        assert_eq!(CombatSystem::explosion_damage(0.0), 80.0);
        assert_eq!(CombatSystem::explosion_damage(40.0), 40.0);
        assert_eq!(CombatSystem::explosion_damage(79.5), 0.0);
        assert_eq!(CombatSystem::explosion_damage(80.0), 0.0);
        assert_eq!(CombatSystem::explosion_damage(200.0), 0.0);
        assert_eq!(CombatSystem::explosion_damage(10.0), 70.0);
    }

    #[test]
    fn thrown_grenade_arcs_toward_facing() {
        let thrower = PlayerState::new(Uuid::new_v4(), Side::Allies);
        let grenade = Grenade::throw(&thrower);
        assert_eq!(grenade.vx, GRENADE_THROW_VX);
        assert_eq!(grenade.vy, GRENADE_THROW_VY);
        assert_eq!(grenade.x, thrower.x + 10.0);
        assert_eq!(grenade.y, thrower.y - 20.0);
        assert_eq!(grenade.timer, GRENADE_FUSE_TICKS);
    }

    /// A grenade resting at the target's feet, one tick from detonation
    fn primed_grenade(state: &SessionState, owner: PlayerId, at: PlayerId) -> Grenade {
        let p = state.player(at).unwrap();
        Grenade {
            owner_id: owner,
            x: p.x,
            // Settles at the grenade floor after this tick's bounce
            y: 410.0,
            vx: 0.0,
            vy: 0.0,
            timer: 1,
            exploded: false,
        }
    }

    #[test]
    fn grenade_detonates_once_when_fuse_expires() {
        let (mut state, thrower, target) = duel();
        let mut grenade = primed_grenade(&state, thrower, target);
        grenade.timer = 3;
        state.grenades.push(grenade);

        assert!(CombatSystem::advance_grenades(&mut state).is_empty());
        assert!(CombatSystem::advance_grenades(&mut state).is_empty());
        let events = CombatSystem::advance_grenades(&mut state);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CombatEvent::Explosion { .. }));
        assert!(state.grenades.is_empty());
        assert!(CombatSystem::advance_grenades(&mut state).is_empty());

        // 10 units below the feet: floor(80 * (1 - 10/80)) = 70
        assert_eq!(state.player(target).unwrap().health, 30.0);
    }

    #[test]
    fn explosion_ignores_trench_and_crouch() {
        let (mut state, thrower, target) = duel();
        {
            let t = state.player_mut(target).unwrap();
            t.in_trench = true;
            t.crouching = true;
        }
        let grenade = primed_grenade(&state, thrower, target);
        state.grenades.push(grenade);

        CombatSystem::advance_grenades(&mut state);
        assert_eq!(state.player(target).unwrap().health, 30.0);
    }

    #[test]
    fn self_kill_by_grenade_earns_no_credit() {
        let (mut state, thrower, _) = duel();
        state.player_mut(thrower).unwrap().health = 20.0;
        let grenade = primed_grenade(&state, thrower, thrower);
        state.grenades.push(grenade);

        let events = CombatSystem::advance_grenades(&mut state);
        assert!(events.contains(&CombatEvent::Kill {
            killer_id: None,
            victim_id: thrower
        }));
        let p = state.player(thrower).unwrap();
        assert!(!p.alive);
        assert_eq!(p.kills, 0);
        assert_eq!(p.deaths, 1);
    }

    #[test]
    fn blast_kill_credits_thrower() {
        let (mut state, thrower, target) = duel();
        state.player_mut(target).unwrap().health = 50.0;
        let grenade = primed_grenade(&state, thrower, target);
        state.grenades.push(grenade);

        let events = CombatSystem::advance_grenades(&mut state);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            CombatEvent::Kill {
                killer_id: Some(thrower),
                victim_id: target
            }
        );
        assert_eq!(state.player(thrower).unwrap().kills, 1);
    }

    #[test]
    fn explosion_out_of_range_changes_nothing() {
        let (mut state, thrower, target) = duel();
        let mut grenade = primed_grenade(&state, thrower, target);
        grenade.x = 800.0;
        state.grenades.push(grenade);

        let events = CombatSystem::advance_grenades(&mut state);
        assert_eq!(events, vec![CombatEvent::Explosion { x: 800.0, y: 410.0 }]);
        assert_eq!(state.player(target).unwrap().health, 100.0);
        assert_eq!(state.player(thrower).unwrap().health, 100.0);
    }
}
