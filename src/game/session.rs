//! Session actor and its authoritative tick loop
//!
//! One tokio task per session owns the `SessionState`. Commands, ticks and
//! timer expiries are multiplexed in a single `select!`, so every mutation
//! to the world is serialized.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_period, RELOAD_DELAY, RESPAWN_DELAY};
use crate::ws::protocol::{InputSnapshot, PlayerId, ServerMsg, Side};

use super::combat::{CombatEvent, CombatSystem};
use super::input::InputProcessor;
use super::physics::PhysicsSystem;
use super::respawn::{RespawnScheduler, TimerKind};
use super::snapshot::SnapshotBuilder;
use super::state::{PlayerState, SessionState};

/// Players per session
pub const MAX_PLAYERS: usize = 2;

/// Queued commands per session before senders wait
const COMMAND_BUFFER: usize = 256;

/// Outbound queue of one connection
pub type Outbox = mpsc::Sender<ServerMsg>;

/// Why a join was refused. The messages are sent to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Session not found")]
    NotFound,
    #[error("Session is full")]
    Full,
}

/// Requests handled by the session task
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        player_id: PlayerId,
        outbox: Outbox,
        /// Send `match_found` to the joiner before the game starts
        announce_match: bool,
        reply: oneshot::Sender<Result<Side, JoinError>>,
    },
    Leave {
        player_id: PlayerId,
    },
    Input {
        player_id: PlayerId,
        input: InputSnapshot,
    },
}

/// Handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub code: String,
    pub cmd_tx: mpsc::Sender<SessionCommand>,
    pub player_count: Arc<AtomicUsize>,
    pub started: Arc<AtomicBool>,
    pub created_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Still waiting for an opponent
    pub fn is_open(&self) -> bool {
        !self.is_started() && self.player_count() < MAX_PLAYERS
    }

    /// Ask the session to admit a player. A session that has already
    /// stopped reports `NotFound`.
    pub async fn join(
        &self,
        player_id: PlayerId,
        outbox: Outbox,
        announce_match: bool,
    ) -> Result<Side, JoinError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Join {
                player_id,
                outbox,
                announce_match,
                reply,
            })
            .await
            .map_err(|_| JoinError::NotFound)?;
        rx.await.unwrap_or(Err(JoinError::NotFound))
    }

    pub async fn leave(&self, player_id: PlayerId) {
        if self
            .cmd_tx
            .send(SessionCommand::Leave { player_id })
            .await
            .is_err()
        {
            debug!(code = %self.code, player_id = %player_id, "Session already stopped");
        }
    }

    /// Forward input without waiting; input is dropped under back-pressure
    pub fn send_input(&self, player_id: PlayerId, input: InputSnapshot) {
        match self
            .cmd_tx
            .try_send(SessionCommand::Input { player_id, input })
        {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(code = %self.code, player_id = %player_id, "Session command queue full, dropping input");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(code = %self.code, player_id = %player_id, "Input for stopped session");
            }
        }
    }
}

/// Fixed-step world advance, run once per tick
pub struct GameLoop;

impl GameLoop {
    /// Advance the world by one tick and report what happened
    pub fn step(state: &mut SessionState) -> Vec<CombatEvent> {
        state.tick += 1;

        let world = state.world;
        for player in state.players.iter_mut().filter(|p| p.alive) {
            PhysicsSystem::step_player(player, &world);
        }

        let mut events = CombatSystem::advance_projectiles(state);
        events.extend(CombatSystem::advance_grenades(state));
        events
    }
}

struct Member {
    player_id: PlayerId,
    side: Side,
    outbox: Outbox,
}

/// The authoritative game session
pub struct Session {
    id: Uuid,
    code: String,
    state: SessionState,
    members: Vec<Member>,
    timers: RespawnScheduler,
    rng: ChaCha8Rng,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    player_count: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
    /// Created once, when the second player arrives
    ticker: Option<Interval>,
}

impl Session {
    /// Create a session with its creator already seated on the allies side
    pub fn new(code: String, creator: PlayerId, outbox: Outbox) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let seed: u64 = rand::thread_rng().gen();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let player_count = Arc::new(AtomicUsize::new(1));
        let started = Arc::new(AtomicBool::new(false));

        let handle = SessionHandle {
            id,
            code: code.clone(),
            cmd_tx,
            player_count: player_count.clone(),
            started: started.clone(),
            created_at: Utc::now(),
        };

        let mut state = SessionState::new();
        state.insert_player(PlayerState::new(creator, Side::Allies));

        info!(code = %code, session_id = %id, seed, creator = %creator, "Session created");

        let session = Self {
            id,
            code,
            state,
            members: vec![Member {
                player_id: creator,
                side: Side::Allies,
                outbox,
            }],
            timers: RespawnScheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            cmd_rx,
            player_count,
            started,
            ticker: None,
        };

        (session, handle)
    }

    /// Run until the last member leaves
    pub async fn run(mut self) {
        while !self.members.is_empty() {
            let next_timer = self.timers.next_deadline();

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = next_tick(self.ticker.as_mut()) => self.run_tick(),
                _ = wait_until(next_timer) => self.fire_timers(),
            }
        }

        info!(
            code = %self.code,
            session_id = %self.id,
            ticks = self.state.tick,
            "Session stopped"
        );
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join {
                player_id,
                outbox,
                announce_match,
                reply,
            } => {
                let result = self.handle_join(player_id, outbox, announce_match);
                let _ = reply.send(result);
            }
            SessionCommand::Leave { player_id } => self.handle_leave(player_id),
            SessionCommand::Input { player_id, input } => self.handle_input(player_id, input),
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        outbox: Outbox,
        announce_match: bool,
    ) -> Result<Side, JoinError> {
        if let Some(side) = self.member_side(player_id) {
            debug!(code = %self.code, player_id = %player_id, "Player rejoined own session");
            self.resync(player_id, side);
            return Ok(side);
        }

        if self.members.len() >= MAX_PLAYERS || self.state.started {
            return Err(JoinError::Full);
        }

        let side = self
            .members
            .first()
            .map_or(Side::Allies, |host| host.side.opponent());
        self.state.insert_player(PlayerState::new(player_id, side));
        self.members.push(Member {
            player_id,
            side,
            outbox,
        });
        self.player_count.store(self.members.len(), Ordering::Relaxed);

        info!(
            code = %self.code,
            player_id = %player_id,
            side = ?side,
            "Player joined session"
        );

        if announce_match {
            self.send_to(
                player_id,
                ServerMsg::MatchFound {
                    code: self.code.clone(),
                },
            );
        }

        self.start();
        Ok(side)
    }

    /// Mark the session started, begin ticking and announce the game
    fn start(&mut self) {
        self.state.started = true;
        self.started.store(true, Ordering::Relaxed);

        let period = tick_period();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);

        info!(code = %self.code, session_id = %self.id, "Game loop started");

        let snapshot = SnapshotBuilder::build(&self.state);
        for member in &self.members {
            send(
                &member.outbox,
                ServerMsg::GameStart {
                    state: snapshot.clone(),
                    player_id: member.player_id,
                    side: member.side,
                },
            );
        }
    }

    /// Repeat the greeting a member would have received
    fn resync(&self, player_id: PlayerId, side: Side) {
        let msg = if self.state.started {
            ServerMsg::GameStart {
                state: SnapshotBuilder::build(&self.state),
                player_id,
                side,
            }
        } else {
            ServerMsg::SessionCreated {
                code: self.code.clone(),
                player_id,
                side,
            }
        };
        self.send_to(player_id, msg);
    }

    fn handle_leave(&mut self, player_id: PlayerId) {
        let Some(idx) = self.members.iter().position(|m| m.player_id == player_id) else {
            debug!(code = %self.code, player_id = %player_id, "Leave from non-member");
            return;
        };

        self.members.remove(idx);
        self.state.remove_player(player_id);
        let cancelled = self.timers.cancel_player(player_id);
        self.player_count.store(self.members.len(), Ordering::Relaxed);

        info!(
            code = %self.code,
            player_id = %player_id,
            remaining = self.members.len(),
            cancelled_timers = cancelled,
            "Player left session"
        );

        self.broadcast(ServerMsg::PlayerLeft { player_id });
    }

    fn handle_input(&mut self, player_id: PlayerId, input: InputSnapshot) {
        if !self.state.started {
            debug!(code = %self.code, player_id = %player_id, "Input before start, ignoring");
            return;
        }

        let now = Instant::now();
        let effects = InputProcessor::apply(&mut self.state, player_id, &input, now, &mut self.rng);
        if effects.fired || effects.threw_grenade {
            debug!(
                code = %self.code,
                player_id = %player_id,
                fired = effects.fired,
                grenade = effects.threw_grenade,
                "Ordnance released"
            );
        }
        if effects.reload_started {
            self.timers
                .schedule(player_id, TimerKind::Reload, now + RELOAD_DELAY);
        }
    }

    fn run_tick(&mut self) {
        let events = GameLoop::step(&mut self.state);
        let now = Instant::now();

        for event in events {
            match event {
                CombatEvent::Kill {
                    killer_id,
                    victim_id,
                } => {
                    debug!(
                        code = %self.code,
                        killer = ?killer_id,
                        victim = %victim_id,
                        "Player killed"
                    );
                    self.timers
                        .schedule(victim_id, TimerKind::Respawn, now + RESPAWN_DELAY);
                }
                CombatEvent::Explosion { x, y } => {
                    self.broadcast(ServerMsg::Explosion { x, y });
                }
            }
        }

        self.broadcast(ServerMsg::State {
            state: SnapshotBuilder::build(&self.state),
        });
    }

    fn fire_timers(&mut self) {
        for timer in self.timers.drain_due(Instant::now()) {
            if timer.apply(&mut self.state) {
                debug!(
                    code = %self.code,
                    player_id = %timer.player_id,
                    kind = ?timer.kind,
                    "Timer fired"
                );
            }
        }
    }

    fn member_side(&self, player_id: PlayerId) -> Option<Side> {
        self.members
            .iter()
            .find(|m| m.player_id == player_id)
            .map(|m| m.side)
    }

    fn send_to(&self, player_id: PlayerId, msg: ServerMsg) {
        if let Some(member) = self.members.iter().find(|m| m.player_id == player_id) {
            send(&member.outbox, msg);
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for member in &self.members {
            send(&member.outbox, msg.clone());
        }
    }
}

/// Queue a message for one connection without blocking the session
pub fn send(outbox: &Outbox, msg: ServerMsg) {
    match outbox.try_send(msg) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Client outbox full, dropping message");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Client outbox closed");
        }
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
