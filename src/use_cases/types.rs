// Use-case level inputs/outputs for the world loop.

use crate::domain::{ActionEvent, HitEvent, PlayerInput, PlayerSnapshot, SessionId, ToyKind, Vec2};

/// Everything a connection can ask of the world task. Sent over a single
/// mpsc channel so only the world task ever mutates simulation state.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// Connection established; creates an unnamed player record.
    Connect { session_id: SessionId },
    /// Name claim; the player becomes active on acceptance.
    Join {
        session_id: SessionId,
        requested_name: String,
    },
    /// Connection closed; removes the record before the next tick.
    Leave { session_id: SessionId },
    Input {
        session_id: SessionId,
        input: PlayerInput,
    },
    Chat {
        session_id: SessionId,
        text: String,
    },
    Equip {
        session_id: SessionId,
        kind: ToyKind,
    },
    ClearEquip { session_id: SessionId },
    EnterRoom {
        session_id: SessionId,
        room_id: String,
    },
    EnterSubroom {
        session_id: SessionId,
        room_id: String,
        subroom_id: String,
    },
    LeaveRoom { session_id: SessionId },
    Action {
        session_id: SessionId,
        kind: ToyKind,
        target: Vec2,
        correlation_id: String,
    },
}

/// Per-tick snapshot of every active player, broadcast unconditionally.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub server_ts: u64,
    pub players: Vec<PlayerSnapshot>,
}

/// Event-style message produced by the world task.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Join accepted; the adapter expands this into the full init payload.
    JoinAccepted { name: String },
    /// Space transition confirmation for the mover.
    RoomChanged {
        room_id: Option<String>,
        subroom_id: Option<String>,
    },
    /// Accepted toy action, replicated to everyone.
    Action(ActionEvent),
    /// Melee connect, replicated to everyone.
    Hit(HitEvent),
    /// The session lost a name conflict and must be closed.
    Kicked { reason: String },
}

/// A session event plus its audience: one session, or all of them.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Option<SessionId>,
    pub event: SessionEvent,
}

impl Outbound {
    pub fn to_session(session_id: SessionId, event: SessionEvent) -> Self {
        Outbound {
            to: Some(session_id),
            event,
        }
    }

    pub fn to_all(event: SessionEvent) -> Self {
        Outbound { to: None, event }
    }
}
