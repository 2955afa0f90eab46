//! HTTP route definitions

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origins);
    let assets = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(assets)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured client origins; any origin when none are set
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
    players: usize,
    details: HashMap<String, SessionDetail>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionDetail {
    players: usize,
    started: bool,
    age_secs: i64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let details = state
        .sessions
        .summaries()
        .into_iter()
        .map(|s| {
            (
                s.code,
                SessionDetail {
                    players: s.players,
                    started: s.started,
                    age_secs: s.age_secs,
                },
            )
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        sessions: state.sessions.session_count(),
        players: state.sessions.total_players(),
        details,
    })
}
