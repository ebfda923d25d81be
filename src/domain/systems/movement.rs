use crate::domain::player::{Player, PlayerInput, Vec2};
use crate::domain::world::Obstacle;

/// Per-space parameters for one integration step.
#[derive(Debug, Clone, Copy)]
pub struct StepConfig<'a> {
    /// Walk speed in the active frame, px/s.
    pub speed: f32,
    /// Avatar collision radius in pixels.
    pub radius: f32,
    /// Per-tick knockback multiplier.
    pub friction: f32,
    /// Bounds of the active frame.
    pub width: f32,
    pub height: f32,
    /// Solid rectangles to push out of; empty for interiors.
    pub obstacles: &'a [Obstacle],
}

/// Unit movement direction from the four intent flags. Diagonals are
/// normalized so two held keys are never faster than one.
pub fn direction_of(input: PlayerInput) -> Vec2 {
    let dx = (input.right as i8 - input.left as i8) as f32;
    let dy = (input.down as i8 - input.up as i8) as f32;
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 {
        Vec2::new(dx / len, dy / len)
    } else {
        Vec2::ZERO
    }
}

/// Advances one player by `dt` in its current frame: input velocity plus
/// the knockback accumulator, obstacle push-out, bounds clamp, then
/// knockback decay.
pub fn step_player(player: &mut Player, dt: f32, cfg: StepConfig) {
    let dir = direction_of(player.input);
    let knockback = *player.knockback_mut();
    let vel = Vec2::new(
        dir.x * cfg.speed + knockback.x,
        dir.y * cfg.speed + knockback.y,
    );

    let prev = player.position();
    let pos = player.position_mut();

    // Axis-separated movement: resolve x against obstacles with y held at
    // its previous value, then resolve y, then re-clamp to bounds.
    pos.x += vel.x * dt;
    for obstacle in cfg.obstacles.iter().filter(|o| o.solid) {
        if circle_overlaps_rect(pos.x, prev.y, cfg.radius, obstacle) {
            pos.x = snap_x(pos.x, cfg.radius, obstacle);
        }
    }

    pos.y += vel.y * dt;
    for obstacle in cfg.obstacles.iter().filter(|o| o.solid) {
        if circle_overlaps_rect(pos.x, pos.y, cfg.radius, obstacle) {
            pos.y = snap_y(pos.y, cfg.radius, obstacle);
        }
    }

    pos.x = clamp_inset(pos.x, cfg.radius, cfg.width);
    pos.y = clamp_inset(pos.y, cfg.radius, cfg.height);

    let kb = player.knockback_mut();
    kb.x *= cfg.friction;
    kb.y *= cfg.friction;
}

fn clamp_inset(value: f32, radius: f32, extent: f32) -> f32 {
    value.clamp(radius, (extent - radius).max(radius))
}

fn circle_overlaps_rect(cx: f32, cy: f32, radius: f32, rect: &Obstacle) -> bool {
    let nearest_x = cx.clamp(rect.x, rect.x + rect.w);
    let nearest_y = cy.clamp(rect.y, rect.y + rect.h);
    let dx = cx - nearest_x;
    let dy = cy - nearest_y;
    dx * dx + dy * dy < radius * radius
}

fn snap_x(cx: f32, radius: f32, rect: &Obstacle) -> f32 {
    // Snap to whichever clear side the center is nearer.
    if cx < rect.x + rect.w / 2.0 {
        rect.x - radius
    } else {
        rect.x + rect.w + radius
    }
}

fn snap_y(cy: f32, radius: f32, rect: &Obstacle) -> f32 {
    if cy < rect.y + rect.h / 2.0 {
        rect.y - radius
    } else {
        rect.y + rect.h + radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.05;

    fn test_player(x: f32, y: f32) -> Player {
        Player::new(1, "#ff8040".to_string(), Vec2::new(x, y), 0.0)
    }

    fn field(speed: f32, obstacles: &[Obstacle]) -> StepConfig<'_> {
        StepConfig {
            speed,
            radius: 14.0,
            friction: 0.90,
            width: 1000.0,
            height: 800.0,
            obstacles,
        }
    }

    fn open_field(speed: f32) -> StepConfig<'static> {
        field(speed, &[])
    }

    #[test]
    fn when_any_input_runs_long_enough_then_position_stays_inside_inset_bounds() {
        let cfg = open_field(220.0);
        let inputs = [
            PlayerInput {
                left: true,
                up: true,
                ..Default::default()
            },
            PlayerInput {
                right: true,
                down: true,
                ..Default::default()
            },
            PlayerInput {
                right: true,
                ..Default::default()
            },
        ];
        for input in inputs {
            let mut player = test_player(500.0, 400.0);
            player.input = input;
            *player.knockback_mut() = Vec2::new(-900.0, 900.0);
            for _ in 0..2000 {
                step_player(&mut player, DT, cfg);
                let pos = player.position();
                assert!(pos.x >= cfg.radius && pos.x <= cfg.width - cfg.radius);
                assert!(pos.y >= cfg.radius && pos.y <= cfg.height - cfg.radius);
            }
        }
    }

    #[test]
    fn when_two_orthogonal_keys_are_held_then_displacement_matches_a_single_key() {
        let cfg = open_field(220.0);

        let mut straight = test_player(500.0, 400.0);
        straight.input = PlayerInput {
            right: true,
            ..Default::default()
        };
        step_player(&mut straight, DT, cfg);
        let straight_dist = (straight.position().x - 500.0).abs();

        let mut diagonal = test_player(500.0, 400.0);
        diagonal.input = PlayerInput {
            right: true,
            down: true,
            ..Default::default()
        };
        step_player(&mut diagonal, DT, cfg);
        let dx = diagonal.position().x - 500.0;
        let dy = diagonal.position().y - 400.0;
        let diagonal_dist = (dx * dx + dy * dy).sqrt();

        assert!((straight_dist - diagonal_dist).abs() < 1e-3);
    }

    #[test]
    fn when_knockback_is_applied_then_it_decays_exponentially_toward_zero() {
        let cfg = open_field(0.0);
        let mut player = test_player(500.0, 400.0);
        *player.knockback_mut() = Vec2::new(420.0, 0.0);

        for n in 1..=40u32 {
            step_player(&mut player, DT, cfg);
            let expected = 420.0 * cfg.friction.powi(n as i32);
            assert!((player.knockback.x - expected).abs() < 1e-2);
        }

        for _ in 0..200 {
            step_player(&mut player, DT, cfg);
        }
        let before = player.position().x;
        step_player(&mut player, DT, cfg);
        assert!((player.position().x - before).abs() < 1e-3);
    }

    #[test]
    fn when_walking_into_a_solid_obstacle_then_the_avatar_is_pushed_out() {
        let obstacles = [Obstacle {
            x: 540.0,
            y: 300.0,
            w: 100.0,
            h: 200.0,
            label: String::new(),
            solid: true,
        }];
        let cfg = field(220.0, &obstacles);
        let mut player = test_player(500.0, 400.0);
        player.input = PlayerInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..100 {
            step_player(&mut player, DT, cfg);
        }
        // Held at the obstacle's left face, inset by the radius.
        assert!((player.position().x - (540.0 - cfg.radius)).abs() < 1e-3);
    }

    #[test]
    fn when_an_obstacle_is_decorative_then_the_avatar_walks_over_it() {
        let obstacles = [Obstacle {
            x: 540.0,
            y: 300.0,
            w: 100.0,
            h: 200.0,
            label: String::new(),
            solid: false,
        }];
        let cfg = field(220.0, &obstacles);
        let mut player = test_player(500.0, 400.0);
        player.input = PlayerInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..20 {
            step_player(&mut player, DT, cfg);
        }
        assert!(player.position().x > 640.0);
    }
}
