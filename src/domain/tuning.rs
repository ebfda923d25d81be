/// Gameplay tuning for avatar movement.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct MovementTuning {
    /// Walk speed on the campus in pixels per second.
    pub campus_speed: f32,

    /// Walk speed inside room/subroom interiors in pixels per second.
    pub interior_speed: f32,

    /// Avatar collision radius in pixels; bounds clamping insets by this.
    pub avatar_radius: f32,

    /// Per-tick multiplier applied to the knockback accumulator.
    pub knockback_friction: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            campus_speed: 220.0,
            interior_speed: 180.0,
            avatar_radius: 14.0,
            knockback_friction: 0.90,
        }
    }
}

/// Gameplay tuning for the bat swing, the only toy with a hit effect.
#[derive(Debug, Clone, Copy)]
pub struct BatTuning {
    /// Maximum distance from swing origin to a hittable victim, in pixels.
    pub range: f32,

    /// Full width of the swing cone in radians.
    pub arc: f32,

    /// Per-victim invulnerability window in seconds.
    pub hit_cooldown: f32,

    /// Impulse added to a victim's knockback accumulator, pixels per second.
    pub knockback_speed: f32,
}

impl Default for BatTuning {
    fn default() -> Self {
        Self {
            range: 70.0,
            arc: std::f32::consts::FRAC_PI_3 * 2.0,
            hit_cooldown: 0.5,
            knockback_speed: 420.0,
        }
    }
}

/// Limits for transient chat bubbles.
#[derive(Debug, Clone, Copy)]
pub struct ChatTuning {
    /// Maximum message length in characters after sanitizing.
    pub max_len: usize,

    /// Minimum seconds between accepted messages from one session.
    pub min_interval: f64,

    /// Seconds a bubble stays attached to the player record.
    pub ttl: f64,
}

impl Default for ChatTuning {
    fn default() -> Self {
        Self {
            max_len: 140,
            min_interval: 0.6,
            ttl: 6.0,
        }
    }
}
