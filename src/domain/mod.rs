// Domain layer: world model, player records, tuning, and simulation systems.

pub mod player;
pub mod systems;
pub mod tuning;
pub mod world;

pub use player::{
    ActionEvent, ChatBubble, HitEvent, Player, PlayerInput, PlayerSnapshot, SessionId, ToyKind,
    Vec2,
};
pub use world::{Interior, Obstacle, Point, Rect, Room, SpaceRef, Subroom, World, WorldConfigError};
