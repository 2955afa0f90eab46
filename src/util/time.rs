//! Time utilities for the simulation clock

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Period of one simulation tick
pub fn tick_period() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Delay before a dead player is restored
pub const RESPAWN_DELAY: Duration = Duration::from_millis(3000);

/// Delay before a reload completes
pub const RELOAD_DELAY: Duration = Duration::from_millis(2000);
