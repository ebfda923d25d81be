use crate::domain::player::{HitEvent, Player, SessionId, Vec2};
use crate::domain::tuning::BatTuning;
use crate::domain::world::SpaceRef;

use std::collections::HashMap;
use tracing::info;

/// One accepted bat swing, already validated against the equip state.
#[derive(Debug, Clone)]
pub struct Swing<'a> {
    pub attacker_id: SessionId,
    pub space: &'a SpaceRef,
    pub origin: Vec2,
    pub target: Vec2,
    /// Sim-clock seconds, used for the per-victim cooldown.
    pub now: f64,
    pub server_ts: u64,
}

/// Cone-and-range hit test against every other active player in the exact
/// same space. Victims inside their cooldown window are skipped; the rest
/// get their hit timestamp refreshed and a knockback impulse away from the
/// swing origin.
pub fn resolve_swing(
    players: &mut HashMap<SessionId, Player>,
    cfg: BatTuning,
    swing: Swing<'_>,
) -> Vec<HitEvent> {
    let facing = {
        let fx = swing.target.x - swing.origin.x;
        let fy = swing.target.y - swing.origin.y;
        let len = (fx * fx + fy * fy).sqrt();
        if len > 0.0 {
            Vec2::new(fx / len, fy / len)
        } else {
            Vec2::new(1.0, 0.0)
        }
    };
    let facing_angle = facing.y.atan2(facing.x);

    let mut hits = Vec::new();
    for candidate in players.values_mut() {
        if candidate.id == swing.attacker_id || candidate.name.is_none() {
            continue;
        }
        if candidate.space != *swing.space {
            continue;
        }

        let pos = candidate.position();
        let dx = pos.x - swing.origin.x;
        let dy = pos.y - swing.origin.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > cfg.range {
            continue;
        }

        let offset = angle_diff(dy.atan2(dx), facing_angle);
        if offset > cfg.arc / 2.0 {
            continue;
        }

        if swing.now - candidate.last_hit_at < cfg.hit_cooldown as f64 {
            continue;
        }
        candidate.last_hit_at = swing.now;

        // Push the victim away from the origin; fall back to the swing
        // facing when the two positions coincide.
        let dir = if dist > 0.0 {
            Vec2::new(dx / dist, dy / dist)
        } else {
            facing
        };
        let kb = candidate.knockback_mut();
        kb.x += dir.x * cfg.knockback_speed;
        kb.y += dir.y * cfg.knockback_speed;

        info!(
            victim_id = candidate.id,
            attacker_id = swing.attacker_id,
            "bat hit"
        );
        hits.push(HitEvent {
            victim_id: candidate.id,
            attacker_id: swing.attacker_id,
            space: swing.space.clone(),
            direction: dir,
            server_ts: swing.server_ts,
        });
    }
    hits
}

/// Absolute angular difference folded into [0, π].
fn angle_diff(a: f32, b: f32) -> f32 {
    let mut d = (a - b).rem_euclid(std::f32::consts::TAU);
    if d > std::f32::consts::PI {
        d = std::f32::consts::TAU - d;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_player(id: SessionId, name: &str, x: f32, y: f32) -> Player {
        let mut player = Player::new(id, "#4080ff".to_string(), Vec2::new(x, y), 0.0);
        player.name = Some(name.to_string());
        player
    }

    fn arena(positions: &[(SessionId, f32, f32)]) -> HashMap<SessionId, Player> {
        positions
            .iter()
            .map(|&(id, x, y)| (id, named_player(id, &format!("p{id}"), x, y)))
            .collect()
    }

    static CAMPUS: SpaceRef = SpaceRef::Campus;

    fn swing_at(now: f64, target: Vec2) -> Swing<'static> {
        Swing {
            attacker_id: 1,
            space: &CAMPUS,
            origin: Vec2::new(100.0, 100.0),
            target,
            now,
            server_ts: 0,
        }
    }

    #[test]
    fn when_the_swing_faces_a_victim_in_range_then_it_hits_once() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 140.0, 100.0)]);
        let hits = resolve_swing(
            &mut players,
            BatTuning::default(),
            swing_at(1.0, Vec2::new(160.0, 100.0)),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].victim_id, 2);
        assert_eq!(hits[0].attacker_id, 1);

        // Knockback points away from the attacker.
        let victim = &players[&2];
        assert!(victim.knockback.x > 0.0);
        assert!((victim.knockback.y).abs() < 1e-3);
    }

    #[test]
    fn when_the_victim_is_behind_the_swing_then_nothing_registers() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 60.0, 100.0)]);
        let hits = resolve_swing(
            &mut players,
            BatTuning::default(),
            swing_at(1.0, Vec2::new(160.0, 100.0)),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn when_the_victim_is_out_of_range_then_nothing_registers() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 400.0, 100.0)]);
        let hits = resolve_swing(
            &mut players,
            BatTuning::default(),
            swing_at(1.0, Vec2::new(160.0, 100.0)),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn when_two_swings_land_inside_the_cooldown_then_only_the_first_hits() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 140.0, 100.0)]);
        let cfg = BatTuning::default();

        let first = resolve_swing(&mut players, cfg, swing_at(1.0, Vec2::new(160.0, 100.0)));
        let second = resolve_swing(&mut players, cfg, swing_at(1.2, Vec2::new(160.0, 100.0)));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());

        // After the window elapses the victim is hittable again.
        let third = resolve_swing(
            &mut players,
            cfg,
            swing_at(1.0 + cfg.hit_cooldown as f64 + 0.01, Vec2::new(160.0, 100.0)),
        );
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn when_players_are_in_different_spaces_then_the_swing_cannot_reach_them() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 140.0, 100.0), (3, 140.0, 100.0)]);
        players.get_mut(&2).unwrap().space = SpaceRef::subroom("gym", "locker-room");
        players.get_mut(&3).unwrap().space = SpaceRef::room("gym");

        let gym = SpaceRef::room("gym");
        let swing = Swing {
            attacker_id: 1,
            space: &gym,
            origin: Vec2::new(100.0, 100.0),
            target: Vec2::new(160.0, 100.0),
            now: 1.0,
            server_ts: 0,
        };
        players.get_mut(&1).unwrap().space = gym.clone();
        players.get_mut(&1).unwrap().room_pos = Vec2::new(100.0, 100.0);
        players.get_mut(&3).unwrap().room_pos = Vec2::new(140.0, 100.0);

        let hits = resolve_swing(&mut players, BatTuning::default(), swing);
        // Only the player in the same room lobby is reachable.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].victim_id, 3);
    }

    #[test]
    fn when_the_victim_overlaps_the_origin_then_knockback_uses_the_facing() {
        let mut players = arena(&[(1, 100.0, 100.0), (2, 100.0, 100.0)]);
        let hits = resolve_swing(
            &mut players,
            BatTuning::default(),
            swing_at(1.0, Vec2::new(160.0, 100.0)),
        );
        assert_eq!(hits.len(), 1);
        let victim = &players[&2];
        assert!(victim.knockback.x > 0.0);
    }

    #[test]
    fn when_the_candidate_has_not_joined_then_it_is_ignored() {
        let mut players = arena(&[(1, 100.0, 100.0)]);
        players.insert(
            2,
            Player::new(2, "#123456".to_string(), Vec2::new(140.0, 100.0), 0.0),
        );
        let hits = resolve_swing(
            &mut players,
            BatTuning::default(),
            swing_at(1.0, Vec2::new(160.0, 100.0)),
        );
        assert!(hits.is_empty());
    }
}
