// Per-session player records and the ephemeral events the simulation emits.

use crate::domain::world::SpaceRef;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Fixed set of equippable toys. Only `Bat` has a gameplay effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToyKind {
    Bat,
    Ball,
    Frisbee,
}

impl ToyKind {
    pub const ALL: [ToyKind; 3] = [ToyKind::Bat, ToyKind::Ball, ToyKind::Frisbee];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bat" => Some(ToyKind::Bat),
            "ball" => Some(ToyKind::Ball),
            "frisbee" => Some(ToyKind::Frisbee),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToyKind::Bat => "bat",
            ToyKind::Ball => "ball",
            ToyKind::Frisbee => "frisbee",
        }
    }
}

/// Latest movement intent for a session. Re-sent inputs just overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Transient chat attached to a player until its TTL elapses.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatBubble {
    pub text: String,
    pub server_ts: u64,
}

pub struct Player {
    pub id: SessionId,
    /// Set once a join is accepted; unnamed players are invisible to peers.
    pub name: Option<String>,
    pub color: String,
    /// Sim-clock seconds at connect; orders duplicate-name resolution.
    pub connected_at: f64,

    pub space: SpaceRef,
    /// Campus-frame position; meaningful while `space` is `Campus`.
    pub pos: Vec2,
    /// Interior-frame position; meaningful while `space` is a room/subroom.
    pub room_pos: Vec2,

    // Decaying impulse accumulators, one per coordinate frame.
    pub knockback: Vec2,
    pub room_knockback: Vec2,

    pub input: PlayerInput,
    pub equipped: Option<ToyKind>,

    pub chat: Option<ChatBubble>,
    /// Sim-clock seconds of the last accepted chat, for throttling.
    pub last_chat_at: f64,
    /// Sim-clock seconds of the last registered melee hit (i-frames).
    pub last_hit_at: f64,
}

impl Player {
    pub fn new(id: SessionId, color: String, spawn: Vec2, connected_at: f64) -> Self {
        Player {
            id,
            name: None,
            color,
            connected_at,
            space: SpaceRef::Campus,
            pos: spawn,
            room_pos: Vec2::ZERO,
            knockback: Vec2::ZERO,
            room_knockback: Vec2::ZERO,
            input: PlayerInput::default(),
            equipped: None,
            chat: None,
            last_chat_at: f64::NEG_INFINITY,
            last_hit_at: f64::NEG_INFINITY,
        }
    }

    /// Position in the frame the player currently occupies.
    pub fn position(&self) -> Vec2 {
        match self.space {
            SpaceRef::Campus => self.pos,
            _ => self.room_pos,
        }
    }

    pub fn position_mut(&mut self) -> &mut Vec2 {
        match self.space {
            SpaceRef::Campus => &mut self.pos,
            _ => &mut self.room_pos,
        }
    }

    /// Knockback accumulator for the frame the player currently occupies.
    pub fn knockback_mut(&mut self) -> &mut Vec2 {
        match self.space {
            SpaceRef::Campus => &mut self.knockback,
            _ => &mut self.room_knockback,
        }
    }

    /// Moves the player into `space`, resetting position to `spawn` and
    /// zeroing both knockback accumulators.
    pub fn place_in(&mut self, space: SpaceRef, spawn: Vec2) {
        self.knockback = Vec2::ZERO;
        self.room_knockback = Vec2::ZERO;
        match space {
            SpaceRef::Campus => self.pos = spawn,
            _ => self.room_pos = spawn,
        }
        self.space = space;
    }
}

/// Per-player slice of the broadcast snapshot. Movement-only state
/// (input, knockback, timers) never leaves the server.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub id: SessionId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub space: SpaceRef,
    pub equipped: Option<ToyKind>,
    pub chat: Option<ChatBubble>,
}

impl PlayerSnapshot {
    /// Snapshot for an active (named) player; `None` before join completes.
    pub fn of(player: &Player) -> Option<Self> {
        let name = player.name.clone()?;
        let pos = player.position();
        Some(PlayerSnapshot {
            id: player.id,
            name,
            color: player.color.clone(),
            x: pos.x,
            y: pos.y,
            space: player.space.clone(),
            equipped: player.equipped,
            chat: player.chat.clone(),
        })
    }
}

/// Replicated toy use. `correlation_id` is opaque; the sender uses it to
/// reconcile its optimistic local prediction with this authoritative echo.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub kind: ToyKind,
    pub player_id: SessionId,
    pub space: SpaceRef,
    pub origin: Vec2,
    pub target: Vec2,
    pub server_ts: u64,
    pub correlation_id: String,
}

/// Cosmetic melee-connect notification. No health model exists.
#[derive(Debug, Clone)]
pub struct HitEvent {
    pub victim_id: SessionId,
    pub attacker_id: SessionId,
    pub space: SpaceRef,
    pub direction: Vec2,
    pub server_ts: u64,
}
