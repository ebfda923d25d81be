// Wire protocol DTOs and conversions for public campus server messages.
// Domain types never cross the socket directly.

use crate::domain::world::Prop;
use crate::domain::{
    ActionEvent, ChatBubble, HitEvent, Interior, Obstacle, PlayerInput, PlayerSnapshot, Point,
    Rect, Room, SpaceRef, Subroom, ToyKind, Vec2, World,
};
use crate::use_cases::Snapshot;
use serde::{Deserialize, Serialize};

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    // Name claim; first message of a session.
    Join { name: String },
    // Latest movement intent; resending just overwrites.
    Input(PlayerInputDto),
    Chat { text: String },
    Equip { kind: String },
    ClearEquip,
    #[serde(rename_all = "camelCase")]
    EnterRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    EnterSubroom {
        room_id: String,
        subroom_id: String,
    },
    LeaveRoom,
    Action(ActionRequestDto),
}

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    // Sent once after a join is accepted.
    Init(InitDto),
    // Space transition confirmation, sent to the mover only.
    RoomChanged(SpaceDto),
    // Per-tick snapshot of every active player.
    State(SnapshotDto),
    // Accepted toy action, replicated to everyone.
    Action(ActionDto),
    // Melee connect, replicated to everyone.
    Hit(HitDto),
    // Sent before the connection is closed on a name conflict.
    Kicked { reason: String },
}

/// Four independent direction flags; absent fields default to released.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInputDto {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        Self {
            up: input.up,
            down: input.down,
            left: input.left,
            right: input.right,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointDto {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for PointDto {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for PointDto {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Toy-use request. The correlation id is opaque to the server and echoed
/// back so the sender can reconcile its optimistic prediction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequestDto {
    pub kind: String,
    pub target: PointDto,
    #[serde(default)]
    pub correlation_id: String,
}

/// Space locator on the wire: both ids absent means the campus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDto {
    pub room_id: Option<String>,
    pub subroom_id: Option<String>,
}

impl From<&SpaceRef> for SpaceDto {
    fn from(space: &SpaceRef) -> Self {
        match space {
            SpaceRef::Campus => SpaceDto {
                room_id: None,
                subroom_id: None,
            },
            SpaceRef::Room { room_id } => SpaceDto {
                room_id: Some(room_id.clone()),
                subroom_id: None,
            },
            SpaceRef::Subroom {
                room_id,
                subroom_id,
            } => SpaceDto {
                room_id: Some(room_id.clone()),
                subroom_id: Some(subroom_id.clone()),
            },
        }
    }
}

/// Handshake payload sent once after a successful join.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitDto {
    pub session_id: String,
    pub name: String,
    pub world: WorldDto,
    pub avatar_radius: f32,
    pub toy_kinds: Vec<&'static str>,
}

/// Static world descriptor shipped to clients for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct WorldDto {
    pub width: f32,
    pub height: f32,
    pub spawn: PointDto,
    pub obstacles: Vec<ObstacleDto>,
    pub rooms: Vec<RoomDto>,
}

impl From<&World> for WorldDto {
    fn from(world: &World) -> Self {
        Self {
            width: world.width,
            height: world.height,
            spawn: world.spawn.into(),
            obstacles: world.obstacles.iter().map(ObstacleDto::from).collect(),
            rooms: world.rooms.iter().map(RoomDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObstacleDto {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub label: String,
    pub solid: bool,
}

impl From<&Obstacle> for ObstacleDto {
    fn from(o: &Obstacle) -> Self {
        Self {
            x: o.x,
            y: o.y,
            w: o.w,
            h: o.h,
            label: o.label.clone(),
            solid: o.solid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RectDto {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl From<Rect> for RectDto {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            w: r.w,
            h: r.h,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropDto {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub label: String,
}

impl From<&Prop> for PropDto {
    fn from(p: &Prop) -> Self {
        Self {
            x: p.x,
            y: p.y,
            w: p.w,
            h: p.h,
            label: p.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InteriorDto {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub spawn: PointDto,
    pub props: Vec<PropDto>,
}

impl From<&Interior> for InteriorDto {
    fn from(i: &Interior) -> Self {
        Self {
            width: i.width,
            height: i.height,
            background: i.background.clone(),
            spawn: i.spawn.into(),
            props: i.props.iter().map(PropDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubroomDto {
    pub id: String,
    pub name: String,
    pub interior: InteriorDto,
}

impl From<&Subroom> for SubroomDto {
    fn from(s: &Subroom) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            interior: (&s.interior).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    pub enter: RectDto,
    pub interior: InteriorDto,
    pub subrooms: Vec<SubroomDto>,
}

impl From<&Room> for RoomDto {
    fn from(r: &Room) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            enter: r.enter.into(),
            interior: (&r.interior).into(),
            subrooms: r.subrooms.iter().map(SubroomDto::from).collect(),
        }
    }
}

/// Per-tick snapshot sent to every client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub server_ts: u64,
    pub players: Vec<PlayerStateDto>,
}

impl From<Snapshot> for SnapshotDto {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            server_ts: snapshot.server_ts,
            players: snapshot.players.iter().map(PlayerStateDto::from).collect(),
        }
    }
}

/// Flattened player state for wire transmission in snapshots. Coordinates
/// are in the frame named by `space`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateDto {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub space: SpaceDto,
    pub equipped: Option<&'static str>,
    pub chat: Option<ChatDto>,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.clone(),
            color: player.color.clone(),
            x: player.x,
            y: player.y,
            space: (&player.space).into(),
            equipped: player.equipped.map(ToyKind::as_str),
            chat: player.chat.as_ref().map(ChatDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub text: String,
    pub server_ts: u64,
}

impl From<&ChatBubble> for ChatDto {
    fn from(bubble: &ChatBubble) -> Self {
        Self {
            text: bubble.text.clone(),
            server_ts: bubble.server_ts,
        }
    }
}

/// Authoritative echo of an accepted toy action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDto {
    pub kind: &'static str,
    pub player_id: String,
    pub space: SpaceDto,
    pub origin: PointDto,
    pub target: PointDto,
    pub server_ts: u64,
    pub correlation_id: String,
}

impl From<&ActionEvent> for ActionDto {
    fn from(action: &ActionEvent) -> Self {
        Self {
            kind: action.kind.as_str(),
            player_id: action.player_id.to_string(),
            space: (&action.space).into(),
            origin: action.origin.into(),
            target: action.target.into(),
            server_ts: action.server_ts,
            correlation_id: action.correlation_id.clone(),
        }
    }
}

/// Cosmetic melee-connect notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitDto {
    pub victim_id: String,
    pub attacker_id: String,
    pub space: SpaceDto,
    pub direction: PointDto,
    pub server_ts: u64,
}

impl From<&HitEvent> for HitDto {
    fn from(hit: &HitEvent) -> Self {
        Self {
            victim_id: hit.victim_id.to_string(),
            attacker_id: hit.attacker_id.to_string(),
            space: (&hit.space).into(),
            direction: hit.direction.into(),
            server_ts: hit.server_ts,
        }
    }
}
