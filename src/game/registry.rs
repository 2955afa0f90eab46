//! Registry of live sessions and the player to session mapping

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{InputSnapshot, PlayerId, ServerMsg, Side};

use super::session::{send, JoinError, Outbox, Session, SessionHandle};

/// Characters allowed in session codes; no 0/O or 1/I
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 5;

/// Result of a matchmaking request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Seated in a waiting session; the game has started
    Joined { code: String, side: Side },
    /// No session was waiting; a new one was opened
    Created { code: String, side: Side },
}

/// Per-session figures for the health endpoint
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub code: String,
    pub players: usize,
    pub started: bool,
    pub age_secs: i64,
}

/// Registry of all active sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    players: DashMap<PlayerId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_code<R: Rng>(rng: &mut R) -> String {
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Open a session hosted by `player_id`. Any session the player is in
    /// is left first.
    pub async fn create_session(self: &Arc<Self>, player_id: PlayerId, outbox: Outbox) -> String {
        self.remove_player(player_id).await;
        self.spawn_session(player_id, outbox, false).code
    }

    /// Join the session named by `code` (case-insensitive)
    pub async fn join_session(
        &self,
        code: &str,
        player_id: PlayerId,
        outbox: Outbox,
    ) -> Result<Side, JoinError> {
        let code = normalize_code(code);
        let handle = self.get(&code).ok_or(JoinError::NotFound)?;
        let side = handle.join(player_id, outbox, false).await?;

        // Only a successful join moves the player out of its previous session
        if let Some(previous) = self.players.insert(player_id, code.clone()) {
            if previous != code {
                if let Some(old) = self.get(&previous) {
                    old.leave(player_id).await;
                }
            }
        }
        Ok(side)
    }

    /// Seat the player in any waiting session, or open a new one
    pub async fn find_or_create_for_match(
        self: &Arc<Self>,
        player_id: PlayerId,
        outbox: Outbox,
    ) -> MatchOutcome {
        self.remove_player(player_id).await;

        let candidates: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.value().clone())
            .collect();

        for handle in candidates {
            match handle.join(player_id, outbox.clone(), true).await {
                Ok(side) => {
                    self.players.insert(player_id, handle.code.clone());
                    return MatchOutcome::Joined {
                        code: handle.code,
                        side,
                    };
                }
                Err(e) => {
                    debug!(code = %handle.code, error = %e, "Match candidate no longer open");
                }
            }
        }

        let handle = self.spawn_session(player_id, outbox, true);
        MatchOutcome::Created {
            code: handle.code,
            side: Side::Allies,
        }
    }

    /// Detach a player from its session. Returns false if it was in none.
    pub async fn remove_player(&self, player_id: PlayerId) -> bool {
        let Some((_, code)) = self.players.remove(&player_id) else {
            return false;
        };
        if let Some(handle) = self.get(&code) {
            handle.leave(player_id).await;
        }
        true
    }

    /// Route input to the player's session; unknown players are ignored
    pub fn dispatch_input(&self, player_id: PlayerId, input: InputSnapshot) {
        let Some(code) = self.session_of(player_id) else {
            debug!(player_id = %player_id, "Input from player outside any session");
            return;
        };
        match self.get(&code) {
            Some(handle) => handle.send_input(player_id, input),
            None => debug!(code = %code, player_id = %player_id, "Input for vanished session"),
        }
    }

    pub fn get(&self, code: &str) -> Option<SessionHandle> {
        self.sessions.get(code).map(|s| s.value().clone())
    }

    pub fn session_of(&self, player_id: PlayerId) -> Option<String> {
        self.players.get(&player_id).map(|c| c.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_players(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.value().player_count())
            .sum()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        let now = chrono::Utc::now();
        self.sessions
            .iter()
            .map(|s| {
                let handle = s.value();
                SessionSummary {
                    code: handle.code.clone(),
                    players: handle.player_count(),
                    started: handle.is_started(),
                    age_secs: (now - handle.created_at).num_seconds(),
                }
            })
            .collect()
    }

    /// Allocate a fresh code, greet the creator and start the session task
    fn spawn_session(self: &Arc<Self>, creator: PlayerId, outbox: Outbox, matchmaking: bool) -> SessionHandle {
        let mut rng = rand::thread_rng();
        loop {
            let code = Self::generate_code(&mut rng);
            let slot = match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!(code = %code, "Session code collision, regenerating");
                    continue;
                }
                Entry::Vacant(slot) => slot,
            };

            let (session, handle) = Session::new(code.clone(), creator, outbox.clone());
            // Queued before the session becomes visible, so it precedes game_start
            let greeting = if matchmaking {
                ServerMsg::WaitingMatch {
                    code: code.clone(),
                    player_id: creator,
                    side: Side::Allies,
                }
            } else {
                ServerMsg::SessionCreated {
                    code: code.clone(),
                    player_id: creator,
                    side: Side::Allies,
                }
            };
            send(&outbox, greeting);

            slot.insert(handle.clone());
            self.players.insert(creator, code.clone());

            let registry = Arc::downgrade(self);
            let session_id = handle.id;
            tokio::spawn(async move {
                session.run().await;
                if let Some(registry) = registry.upgrade() {
                    registry.deregister(&code, session_id);
                }
            });

            return handle;
        }
    }

    fn deregister(&self, code: &str, session_id: Uuid) {
        if self
            .sessions
            .remove_if(code, |_, handle| handle.id == session_id)
            .is_some()
        {
            self.players.retain(|_, c| c.as_str() != code);
            info!(code = %code, "Session removed");
        }
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
