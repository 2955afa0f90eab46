//! Delayed per-player state changes: respawn after death, reload completion
//!
//! Timers live inside the owning session task and fire through the same
//! loop that runs ticks and applies input, so they never race a tick.
//! Dropping the scheduler drops every pending timer.

use tokio::time::Instant;
use tracing::debug;

use crate::ws::protocol::PlayerId;

use super::state::{SessionState, AMMO_CAPACITY};

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Respawn,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub due: Instant,
    pub player_id: PlayerId,
    pub kind: TimerKind,
}

impl ScheduledTimer {
    /// Apply the timer's effect. Returns false if the player is gone.
    pub fn apply(&self, state: &mut SessionState) -> bool {
        let Some(player) = state.player_mut(self.player_id) else {
            debug!(player_id = %self.player_id, kind = ?self.kind, "Timer target left, skipping");
            return false;
        };

        match self.kind {
            TimerKind::Respawn => player.respawn(),
            TimerKind::Reload => {
                player.ammo = AMMO_CAPACITY;
                player.reloading = false;
            }
        }
        true
    }
}

/// Pending timers for one session, keyed by (player, kind)
#[derive(Debug, Default)]
pub struct RespawnScheduler {
    pending: Vec<ScheduledTimer>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer, replacing any pending one of the same kind for the player
    pub fn schedule(&mut self, player_id: PlayerId, kind: TimerKind, due: Instant) {
        self.pending
            .retain(|t| !(t.player_id == player_id && t.kind == kind));
        self.pending.push(ScheduledTimer {
            due,
            player_id,
            kind,
        });
    }

    /// Drop all timers for a player. Returns how many were cancelled.
    pub fn cancel_player(&mut self, player_id: PlayerId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|t| t.player_id != player_id);
        before - self.pending.len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.due).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn drain_due(&mut self, now: Instant) -> Vec<ScheduledTimer> {
        let mut due: Vec<ScheduledTimer> = Vec::new();
        self.pending.retain(|t| {
            if t.due <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|t| t.due);
        due
    }

    #[cfg(test)]
    pub fn is_pending(&self, player_id: PlayerId, kind: TimerKind) -> bool {
        self.pending
            .iter()
            .any(|t| t.player_id == player_id && t.kind == kind)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerState;
    use crate::ws::protocol::Side;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn drains_only_due_timers_in_order() {
        let now = Instant::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut timers = RespawnScheduler::new();
        timers.schedule(a, TimerKind::Respawn, now + Duration::from_millis(3000));
        timers.schedule(b, TimerKind::Reload, now + Duration::from_millis(2000));

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(2000)));
        assert!(timers.drain_due(now + Duration::from_millis(1999)).is_empty());

        let due = timers.drain_due(now + Duration::from_millis(3000));
        let order: Vec<PlayerId> = due.iter().map(|t| t.player_id).collect();
        assert_eq!(order, vec![b, a]);
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn rescheduling_replaces_same_kind() {
        let now = Instant::now();
        let a = Uuid::new_v4();
        let mut timers = RespawnScheduler::new();
        timers.schedule(a, TimerKind::Reload, now);
        timers.schedule(a, TimerKind::Reload, now + Duration::from_secs(1));
        timers.schedule(a, TimerKind::Respawn, now);
        assert_eq!(timers.len(), 2);
        assert!(timers.is_pending(a, TimerKind::Reload));
    }

    #[test]
    fn cancel_player_drops_all_their_timers() {
        let now = Instant::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut timers = RespawnScheduler::new();
        timers.schedule(a, TimerKind::Reload, now);
        timers.schedule(a, TimerKind::Respawn, now);
        timers.schedule(b, TimerKind::Respawn, now);

        assert_eq!(timers.cancel_player(a), 2);
        assert_eq!(timers.len(), 1);
        assert!(timers.is_pending(b, TimerKind::Respawn));
    }

    #[test]
    fn firing_for_departed_player_is_skipped() {
        let mut state = SessionState::new();
        let timer = ScheduledTimer {
            due: Instant::now(),
            player_id: Uuid::new_v4(),
            kind: TimerKind::Respawn,
        };
        assert!(!timer.apply(&mut state));
    }

    #[test]
    fn reload_refills_and_clears_flag() {
        let id = Uuid::new_v4();
        let mut state = SessionState::new();
        let mut player = PlayerState::new(id, Side::Allies);
        player.ammo = 4;
        player.reloading = true;
        state.insert_player(player);

        let timer = ScheduledTimer {
            due: Instant::now(),
            player_id: id,
            kind: TimerKind::Reload,
        };
        assert!(timer.apply(&mut state));
        let player = state.player(id).unwrap();
        assert_eq!(player.ammo, AMMO_CAPACITY);
        assert!(!player.reloading);
    }

    #[test]
    fn respawn_brings_player_back() {
        let id = Uuid::new_v4();
        let mut state = SessionState::new();
        state.insert_player(PlayerState::new(id, Side::Axis));
        state.player_mut(id).unwrap().take_damage(100.0);

        let timer = ScheduledTimer {
            due: Instant::now(),
            player_id: id,
            kind: TimerKind::Respawn,
        };
        assert!(timer.apply(&mut state));
        let player = state.player(id).unwrap();
        assert!(player.alive);
        assert_eq!(player.health, 100.0);
        assert_eq!(player.x, 1480.0);
    }
}
