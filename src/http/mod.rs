//! HTTP surface: health, WebSocket upgrade and static assets

mod routes;

pub use routes::build_router;
