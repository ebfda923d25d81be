use crate::domain::World;
use crate::use_cases::{GameEvent, Outbound, Snapshot};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Client events flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Per-tick snapshots produced by the world task (domain structs).
    pub snapshot_tx: broadcast::Sender<Snapshot>,
    // Serialized snapshots, shared across all connections.
    pub snapshot_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized snapshot for lag recovery.
    pub snapshot_latest_tx: watch::Sender<Utf8Bytes>,
    // Event-style messages (init, roomChanged, action, hit, kicked).
    pub outbound_tx: broadcast::Sender<Outbound>,
    // Immutable world, shared with connections for the init payload.
    pub world: Arc<World>,
}
