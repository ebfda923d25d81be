// Use cases layer: application workflows for the campus server.

pub mod chat;
pub mod game;
pub mod identity;
pub mod sim;
pub mod types;

pub use sim::WorldSim;
pub use types::{GameEvent, Outbound, SessionEvent, Snapshot};
