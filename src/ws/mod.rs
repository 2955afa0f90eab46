//! WebSocket transport: wire protocol and per-connection handler

pub mod handler;
pub mod protocol;
