//! Game simulation modules

pub mod combat;
pub mod input;
pub mod physics;
pub mod registry;
pub mod respawn;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod trench;

pub use registry::{MatchOutcome, SessionRegistry};
pub use session::Outbox;
