// Static campus description: bounds, obstacles, and the room/subroom tree.
// Loaded once at startup and shared read-only with the simulation.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Rectangle on the campus. Solid obstacles block movement; decorative
/// ones are rendered but walkable.
#[derive(Debug, Clone, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_solid")]
    pub solid: bool,
}

fn default_solid() -> bool {
    true
}

/// Decorative object inside an interior. Never collides.
#[derive(Debug, Clone, Deserialize)]
pub struct Prop {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub label: String,
}

/// Playable area of a room or subroom, with its own coordinate frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Interior {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub background: String,
    pub spawn: Point,
    #[serde(default)]
    pub props: Vec<Prop>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subroom {
    pub id: String,
    pub name: String,
    pub interior: Interior,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Footprint on the campus that triggers entry.
    pub enter: Rect,
    pub interior: Interior,
    #[serde(default)]
    pub subrooms: Vec<Subroom>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct World {
    pub width: f32,
    pub height: f32,
    pub spawn: Point,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

/// Which coordinate frame a player currently occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SpaceRef {
    #[default]
    Campus,
    Room {
        room_id: String,
    },
    Subroom {
        room_id: String,
        subroom_id: String,
    },
}

impl SpaceRef {
    pub fn room(room_id: impl Into<String>) -> Self {
        SpaceRef::Room {
            room_id: room_id.into(),
        }
    }

    pub fn subroom(room_id: impl Into<String>, subroom_id: impl Into<String>) -> Self {
        SpaceRef::Subroom {
            room_id: room_id.into(),
            subroom_id: subroom_id.into(),
        }
    }
}

// Fatal configuration problems found while validating a parsed world.
#[derive(Debug, PartialEq)]
pub enum WorldConfigError {
    NonPositiveBounds { place: String },
    DuplicateRoomId { room_id: String },
    DuplicateSubroomId { room_id: String, subroom_id: String },
}

impl std::fmt::Display for WorldConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldConfigError::NonPositiveBounds { place } => {
                write!(f, "non-positive bounds in {place}")
            }
            WorldConfigError::DuplicateRoomId { room_id } => {
                write!(f, "duplicate room id {room_id:?}")
            }
            WorldConfigError::DuplicateSubroomId {
                room_id,
                subroom_id,
            } => write!(f, "duplicate subroom id {subroom_id:?} in room {room_id:?}"),
        }
    }
}

impl World {
    /// Checks the invariants the simulation relies on: strictly positive
    /// bounds everywhere, unique room ids, unique subroom ids per room.
    pub fn validate(&self) -> Result<(), WorldConfigError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(WorldConfigError::NonPositiveBounds {
                place: "campus".to_string(),
            });
        }

        let mut seen_rooms = std::collections::HashSet::new();
        for room in &self.rooms {
            if !seen_rooms.insert(room.id.as_str()) {
                return Err(WorldConfigError::DuplicateRoomId {
                    room_id: room.id.clone(),
                });
            }
            if room.interior.width <= 0.0 || room.interior.height <= 0.0 {
                return Err(WorldConfigError::NonPositiveBounds {
                    place: format!("room {:?}", room.id),
                });
            }

            let mut seen_subrooms = std::collections::HashSet::new();
            for sub in &room.subrooms {
                if !seen_subrooms.insert(sub.id.as_str()) {
                    return Err(WorldConfigError::DuplicateSubroomId {
                        room_id: room.id.clone(),
                        subroom_id: sub.id.clone(),
                    });
                }
                if sub.interior.width <= 0.0 || sub.interior.height <= 0.0 {
                    return Err(WorldConfigError::NonPositiveBounds {
                        place: format!("subroom {:?}/{:?}", room.id, sub.id),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn subroom(&self, room_id: &str, subroom_id: &str) -> Option<&Subroom> {
        self.room(room_id)?
            .subrooms
            .iter()
            .find(|s| s.id == subroom_id)
    }

    /// Interior for a space locator, or `None` for the campus.
    pub fn interior_of(&self, space: &SpaceRef) -> Option<&Interior> {
        match space {
            SpaceRef::Campus => None,
            SpaceRef::Room { room_id } => self.room(room_id).map(|r| &r.interior),
            SpaceRef::Subroom {
                room_id,
                subroom_id,
            } => self.subroom(room_id, subroom_id).map(|s| &s.interior),
        }
    }

    /// Width/height of the space a locator points at, falling back to the
    /// campus bounds. Locators are only set through validated transitions,
    /// so a dangling one is treated as campus.
    pub fn bounds_of(&self, space: &SpaceRef) -> (f32, f32) {
        match self.interior_of(space) {
            Some(interior) => (interior.width, interior.height),
            None => (self.width, self.height),
        }
    }

    /// Spawn point of the space a locator points at, falling back to the
    /// campus spawn.
    pub fn spawn_of(&self, space: &SpaceRef) -> Point {
        match self.interior_of(space) {
            Some(interior) => interior.spawn,
            None => self.spawn,
        }
    }

    /// In-code fallback layout used when no world file is present.
    pub fn default_campus() -> Self {
        World {
            width: 1920.0,
            height: 1080.0,
            spawn: Point { x: 960.0, y: 620.0 },
            obstacles: vec![
                Obstacle {
                    x: 240.0,
                    y: 160.0,
                    w: 320.0,
                    h: 220.0,
                    label: "Library".to_string(),
                    solid: true,
                },
                Obstacle {
                    x: 1340.0,
                    y: 200.0,
                    w: 360.0,
                    h: 240.0,
                    label: "Gym".to_string(),
                    solid: true,
                },
                Obstacle {
                    x: 880.0,
                    y: 420.0,
                    w: 160.0,
                    h: 160.0,
                    label: "Fountain".to_string(),
                    solid: false,
                },
            ],
            rooms: vec![
                Room {
                    id: "gym".to_string(),
                    name: "Gymnasium".to_string(),
                    enter: Rect {
                        x: 1340.0,
                        y: 440.0,
                        w: 360.0,
                        h: 60.0,
                    },
                    interior: Interior {
                        width: 800.0,
                        height: 480.0,
                        background: "hardwood".to_string(),
                        spawn: Point { x: 400.0, y: 420.0 },
                        props: vec![Prop {
                            x: 40.0,
                            y: 40.0,
                            w: 120.0,
                            h: 60.0,
                            label: "Bleachers".to_string(),
                        }],
                    },
                    subrooms: vec![Subroom {
                        id: "locker-room".to_string(),
                        name: "Locker Room".to_string(),
                        interior: Interior {
                            width: 420.0,
                            height: 300.0,
                            background: "tile".to_string(),
                            spawn: Point { x: 210.0, y: 260.0 },
                            props: Vec::new(),
                        },
                    }],
                },
                Room {
                    id: "cafe".to_string(),
                    name: "Campus Cafe".to_string(),
                    enter: Rect {
                        x: 240.0,
                        y: 380.0,
                        w: 320.0,
                        h: 60.0,
                    },
                    interior: Interior {
                        width: 640.0,
                        height: 400.0,
                        background: "checker".to_string(),
                        spawn: Point { x: 320.0, y: 340.0 },
                        props: Vec::new(),
                    },
                    subrooms: Vec::new(),
                },
            ],
        }
    }
}
