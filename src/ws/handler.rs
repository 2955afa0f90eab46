//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::session::send;
use crate::game::{MatchOutcome, Outbox};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, PlayerId, ServerMsg};

/// Outbound messages buffered per connection before the session starts
/// dropping them
pub const OUTBOX_CAPACITY: usize = 128;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id: PlayerId = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

    run_connection(player_id, &state, ws_sink, ws_stream, outbox, outbox_rx).await;

    // Cleanup on disconnect
    state.sessions.remove_player(player_id).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the connection with read/write split
async fn run_connection(
    player_id: PlayerId,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    outbox: Outbox,
    mut outbox_rx: mpsc::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> sessions
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited inbound message");
                    continue;
                }

                if let Some(msg) = parse_client_msg(player_id, &text) {
                    dispatch(state, player_id, &outbox, msg).await;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Decode one text frame; malformed payloads are dropped
fn parse_client_msg(player_id: PlayerId, text: &str) -> Option<ClientMsg> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!(player_id = %player_id, error = %e, "Failed to parse client message");
            None
        }
    }
}

/// Act on one client message
async fn dispatch(state: &AppState, player_id: PlayerId, outbox: &Outbox, msg: ClientMsg) {
    match msg {
        ClientMsg::CreateSession => {
            state.sessions.create_session(player_id, outbox.clone()).await;
        }
        ClientMsg::JoinSession { code } => {
            if let Err(e) = state
                .sessions
                .join_session(&code, player_id, outbox.clone())
                .await
            {
                debug!(player_id = %player_id, code = %code, error = %e, "Join rejected");
                send(
                    outbox,
                    ServerMsg::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        ClientMsg::Input { input } => {
            state.sessions.dispatch_input(player_id, input);
        }
        ClientMsg::FindMatch => {
            match state
                .sessions
                .find_or_create_for_match(player_id, outbox.clone())
                .await
            {
                MatchOutcome::Joined { code, .. } => {
                    info!(player_id = %player_id, code = %code, "Matched into waiting session");
                }
                MatchOutcome::Created { code, .. } => {
                    info!(player_id = %player_id, code = %code, "Waiting for a match");
                }
            }
        }
        ClientMsg::Ping => send(outbox, ServerMsg::Pong),
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
