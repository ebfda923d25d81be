// The authoritative simulation core. `WorldSim` is synchronous and stepped
// one fixed tick at a time; the async driver in `game.rs` owns the only
// instance, so player state is never mutated from two places at once.

use crate::domain::systems::melee::{self, Swing};
use crate::domain::systems::movement::{self, StepConfig};
use crate::domain::tuning::{BatTuning, ChatTuning, MovementTuning};
use crate::domain::{
    ChatBubble, Player, PlayerSnapshot, SessionId, SpaceRef, ToyKind, Vec2, World,
};
use crate::use_cases::types::{GameEvent, Outbound, SessionEvent, Snapshot};
use crate::use_cases::{chat, identity};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const COLOR_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
];

const KICK_REASON_DUPLICATE: &str = "name already in use";

pub struct WorldSim {
    world: Arc<World>,
    movement: MovementTuning,
    bat: BatTuning,
    chat: ChatTuning,

    players: HashMap<SessionId, Player>,

    /// Sim-clock seconds since startup; advanced only by `step`.
    now: f64,
    /// Wall-clock epoch millis captured at startup; wire timestamps are
    /// `epoch_ms + now`, so tests stepping the sim stay deterministic.
    epoch_ms: u64,

    /// Seconds between residual duplicate-name sweeps.
    sweep_interval: f64,
    last_sweep_at: f64,

    next_color: usize,
}

impl WorldSim {
    pub fn new(world: Arc<World>, epoch_ms: u64, sweep_interval: f64) -> Self {
        WorldSim {
            world,
            movement: MovementTuning::default(),
            bat: BatTuning::default(),
            chat: ChatTuning::default(),
            players: HashMap::new(),
            now: 0.0,
            epoch_ms,
            sweep_interval,
            last_sweep_at: 0.0,
            next_color: 0,
        }
    }

    pub fn server_ts(&self) -> u64 {
        self.epoch_ms + (self.now * 1000.0) as u64
    }

    /// Applies one client event between ticks and returns the event-style
    /// messages it produced.
    pub fn apply(&mut self, event: GameEvent) -> Vec<Outbound> {
        match event {
            GameEvent::Connect { session_id } => {
                self.on_connect(session_id);
                Vec::new()
            }
            GameEvent::Join {
                session_id,
                requested_name,
            } => self.on_join(session_id, &requested_name),
            GameEvent::Leave { session_id } => {
                if self.players.remove(&session_id).is_some() {
                    info!(session_id, "player left");
                }
                Vec::new()
            }
            GameEvent::Input { session_id, input } => {
                if let Some(player) = self.players.get_mut(&session_id) {
                    player.input = input;
                }
                Vec::new()
            }
            GameEvent::Chat { session_id, text } => {
                self.on_chat(session_id, &text);
                Vec::new()
            }
            GameEvent::Equip { session_id, kind } => {
                if let Some(player) = self.players.get_mut(&session_id) {
                    player.equipped = Some(kind);
                }
                Vec::new()
            }
            GameEvent::ClearEquip { session_id } => {
                if let Some(player) = self.players.get_mut(&session_id) {
                    player.equipped = None;
                }
                Vec::new()
            }
            GameEvent::EnterRoom {
                session_id,
                room_id,
            } => self.on_enter(session_id, SpaceRef::room(room_id)),
            GameEvent::EnterSubroom {
                session_id,
                room_id,
                subroom_id,
            } => self.on_enter(session_id, SpaceRef::subroom(room_id, subroom_id)),
            GameEvent::LeaveRoom { session_id } => self.on_enter(session_id, SpaceRef::Campus),
            GameEvent::Action {
                session_id,
                kind,
                target,
                correlation_id,
            } => self.on_action(session_id, kind, target, correlation_id),
        }
    }

    /// Advances one fixed tick: movement and knockback decay for every
    /// player, chat expiry, and the periodic duplicate sweep. Returns the
    /// broadcast snapshot plus any sweep evictions.
    pub fn step(&mut self, dt: f32) -> (Snapshot, Vec<Outbound>) {
        self.now += dt as f64;
        let server_ts = self.server_ts();
        let chat_ttl_ms = (self.chat.ttl * 1000.0) as u64;

        for player in self.players.values_mut() {
            let (width, height) = self.world.bounds_of(&player.space);
            let on_campus = player.space == SpaceRef::Campus;
            let cfg = StepConfig {
                speed: if on_campus {
                    self.movement.campus_speed
                } else {
                    self.movement.interior_speed
                },
                radius: self.movement.avatar_radius,
                friction: self.movement.knockback_friction,
                width,
                height,
                obstacles: if on_campus {
                    &self.world.obstacles
                } else {
                    &[]
                },
            };
            movement::step_player(player, dt, cfg);

            if let Some(bubble) = &player.chat
                && server_ts.saturating_sub(bubble.server_ts) >= chat_ttl_ms
            {
                player.chat = None;
            }
        }

        let mut outbound = Vec::new();
        if self.now - self.last_sweep_at >= self.sweep_interval {
            self.last_sweep_at = self.now;
            outbound = self.sweep_duplicates();
        }

        (self.snapshot(server_ts), outbound)
    }

    pub fn player(&self, session_id: SessionId) -> Option<&Player> {
        self.players.get(&session_id)
    }

    fn snapshot(&self, server_ts: u64) -> Snapshot {
        let mut players: Vec<PlayerSnapshot> =
            self.players.values().filter_map(PlayerSnapshot::of).collect();
        players.sort_by_key(|p| p.id);
        Snapshot { server_ts, players }
    }

    fn on_connect(&mut self, session_id: SessionId) {
        let color = COLOR_PALETTE[self.next_color % COLOR_PALETTE.len()].to_string();
        self.next_color += 1;
        let spawn = self.world.spawn;
        self.players.insert(
            session_id,
            Player::new(session_id, color, Vec2::new(spawn.x, spawn.y), self.now),
        );
        debug!(session_id, "session connected");
    }

    fn on_join(&mut self, session_id: SessionId, requested_name: &str) -> Vec<Outbound> {
        if !self.players.contains_key(&session_id) {
            return Vec::new();
        }
        let name = identity::sanitize_name(requested_name);

        match identity::claim_name(&self.players, session_id, &name) {
            identity::ClaimOutcome::Accepted { evicted } => {
                let mut outbound = Vec::new();
                for loser in evicted {
                    self.players.remove(&loser);
                    info!(session_id = loser, "evicted duplicate name holder");
                    outbound.push(Outbound::to_session(
                        loser,
                        SessionEvent::Kicked {
                            reason: KICK_REASON_DUPLICATE.to_string(),
                        },
                    ));
                }
                if let Some(player) = self.players.get_mut(&session_id) {
                    player.name = Some(name.clone());
                    info!(session_id, name = %name, "player joined");
                    outbound.push(Outbound::to_session(
                        session_id,
                        SessionEvent::JoinAccepted { name },
                    ));
                }
                outbound
            }
            identity::ClaimOutcome::Rejected => {
                self.players.remove(&session_id);
                info!(session_id, name = %name, "join rejected, name in use");
                vec![Outbound::to_session(
                    session_id,
                    SessionEvent::Kicked {
                        reason: KICK_REASON_DUPLICATE.to_string(),
                    },
                )]
            }
        }
    }

    fn on_chat(&mut self, session_id: SessionId, text: &str) {
        let now = self.now;
        let server_ts = self.server_ts();
        let cfg = self.chat;
        let Some(player) = self.players.get_mut(&session_id) else {
            return;
        };
        if player.name.is_none() || !chat::within_rate_limit(player, now, &cfg) {
            return;
        }
        let Some(sanitized) = chat::sanitize_chat(text, &cfg) else {
            return;
        };
        player.last_chat_at = now;
        player.chat = Some(ChatBubble {
            text: sanitized,
            server_ts,
        });
    }

    fn on_enter(&mut self, session_id: SessionId, space: SpaceRef) -> Vec<Outbound> {
        // Validated transition: the target must exist in the world model.
        let exists = match &space {
            SpaceRef::Campus => true,
            SpaceRef::Room { room_id } => self.world.room(room_id).is_some(),
            SpaceRef::Subroom {
                room_id,
                subroom_id,
            } => self.world.subroom(room_id, subroom_id).is_some(),
        };
        if !exists {
            debug!(session_id, ?space, "room transition to unknown space dropped");
            return Vec::new();
        }

        let spawn = self.world.spawn_of(&space);
        let Some(player) = self.players.get_mut(&session_id) else {
            return Vec::new();
        };
        player.place_in(space.clone(), Vec2::new(spawn.x, spawn.y));

        let (room_id, subroom_id) = match space {
            SpaceRef::Campus => (None, None),
            SpaceRef::Room { room_id } => (Some(room_id), None),
            SpaceRef::Subroom {
                room_id,
                subroom_id,
            } => (Some(room_id), Some(subroom_id)),
        };
        // Only the mover needs the confirmation; everyone else sees the new
        // locator in the next snapshot.
        vec![Outbound::to_session(
            session_id,
            SessionEvent::RoomChanged {
                room_id,
                subroom_id,
            },
        )]
    }

    fn on_action(
        &mut self,
        session_id: SessionId,
        kind: ToyKind,
        target: Vec2,
        correlation_id: String,
    ) -> Vec<Outbound> {
        let Some(player) = self.players.get(&session_id) else {
            return Vec::new();
        };
        // An action for anything but the equipped toy is a spoof; drop it.
        if player.name.is_none() || player.equipped != Some(kind) {
            debug!(session_id, kind = kind.as_str(), "action/equip mismatch dropped");
            return Vec::new();
        }

        let space = player.space.clone();
        let origin = player.position();
        let (width, height) = self.world.bounds_of(&space);
        let target = Vec2::new(target.x.clamp(0.0, width), target.y.clamp(0.0, height));
        let server_ts = self.server_ts();

        let action = crate::domain::ActionEvent {
            kind,
            player_id: session_id,
            space: space.clone(),
            origin,
            target,
            server_ts,
            correlation_id,
        };
        let mut outbound = vec![Outbound::to_all(SessionEvent::Action(action))];

        if kind == ToyKind::Bat {
            let hits = melee::resolve_swing(
                &mut self.players,
                self.bat,
                Swing {
                    attacker_id: session_id,
                    space: &space,
                    origin,
                    target,
                    now: self.now,
                    server_ts,
                },
            );
            outbound.extend(
                hits.into_iter()
                    .map(|hit| Outbound::to_all(SessionEvent::Hit(hit))),
            );
        }
        outbound
    }

    fn sweep_duplicates(&mut self) -> Vec<Outbound> {
        let evicted = identity::duplicate_sweep(&self.players);
        evicted
            .into_iter()
            .map(|session_id| {
                self.players.remove(&session_id);
                info!(session_id, "sweep evicted duplicate name holder");
                Outbound::to_session(
                    session_id,
                    SessionEvent::Kicked {
                        reason: KICK_REASON_DUPLICATE.to_string(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayerInput;

    const DT: f32 = 0.05;

    fn sim() -> WorldSim {
        WorldSim::new(Arc::new(open_world()), 1_700_000_000_000, 15.0)
    }

    // Obstacle-free campus so movement scenarios are pure integration.
    fn open_world() -> World {
        let mut world = World::default_campus();
        world.obstacles.clear();
        world
    }

    fn join(sim: &mut WorldSim, session_id: SessionId, name: &str) -> Vec<Outbound> {
        sim.apply(GameEvent::Connect { session_id });
        sim.apply(GameEvent::Join {
            session_id,
            requested_name: name.to_string(),
        })
    }

    fn kicked_sessions(outbound: &[Outbound]) -> Vec<SessionId> {
        outbound
            .iter()
            .filter(|o| matches!(o.event, SessionEvent::Kicked { .. }))
            .filter_map(|o| o.to)
            .collect()
    }

    #[test]
    fn when_a_moves_right_for_a_second_then_only_a_advances_by_campus_speed() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        join(&mut sim, 2, "B");
        let start_a = sim.player(1).unwrap().position();
        let start_b = sim.player(2).unwrap().position();

        sim.apply(GameEvent::Input {
            session_id: 1,
            input: PlayerInput {
                right: true,
                ..Default::default()
            },
        });
        for _ in 0..20 {
            sim.step(DT);
        }

        let end_a = sim.player(1).unwrap().position();
        let end_b = sim.player(2).unwrap().position();
        assert!((end_a.x - start_a.x - 220.0).abs() < 1.0);
        assert!((end_a.y - start_a.y).abs() < 1e-3);
        assert_eq!(end_b, start_b);
    }

    #[test]
    fn when_entering_and_leaving_a_room_then_spawn_and_locator_follow() {
        let mut sim = sim();
        join(&mut sim, 1, "A");

        let outbound = sim.apply(GameEvent::EnterRoom {
            session_id: 1,
            room_id: "gym".to_string(),
        });
        assert!(matches!(
            outbound.as_slice(),
            [Outbound {
                to: Some(1),
                event: SessionEvent::RoomChanged { .. },
            }]
        ));
        let player = sim.player(1).unwrap();
        assert_eq!(player.space, SpaceRef::room("gym"));
        let gym_spawn = sim.world.spawn_of(&SpaceRef::room("gym"));
        assert_eq!(player.position(), Vec2::new(gym_spawn.x, gym_spawn.y));

        let outbound = sim.apply(GameEvent::LeaveRoom { session_id: 1 });
        assert!(matches!(
            &outbound[0].event,
            SessionEvent::RoomChanged {
                room_id: None,
                subroom_id: None,
            }
        ));
        assert_eq!(sim.player(1).unwrap().space, SpaceRef::Campus);
    }

    #[test]
    fn when_entering_an_unknown_room_then_the_request_is_dropped() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        let outbound = sim.apply(GameEvent::EnterRoom {
            session_id: 1,
            room_id: "no-such-room".to_string(),
        });
        assert!(outbound.is_empty());
        assert_eq!(sim.player(1).unwrap().space, SpaceRef::Campus);
    }

    #[test]
    fn when_a_bats_adjacent_b_then_b_takes_exactly_one_hit_away_from_a() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        join(&mut sim, 2, "B");
        sim.players.get_mut(&1).unwrap().pos = Vec2::new(500.0, 500.0);
        sim.players.get_mut(&2).unwrap().pos = Vec2::new(540.0, 500.0);

        sim.apply(GameEvent::Equip {
            session_id: 1,
            kind: ToyKind::Bat,
        });
        let outbound = sim.apply(GameEvent::Action {
            session_id: 1,
            kind: ToyKind::Bat,
            target: Vec2::new(560.0, 500.0),
            correlation_id: "c-1".to_string(),
        });

        let hits: Vec<_> = outbound
            .iter()
            .filter_map(|o| match &o.event {
                SessionEvent::Hit(hit) => Some(hit),
                _ => None,
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].victim_id, 2);
        assert_eq!(hits[0].attacker_id, 1);

        let b = sim.player(2).unwrap();
        assert!(b.knockback.x > 0.0);
        assert!(b.knockback.length() > 0.0);
    }

    #[test]
    fn when_the_action_kind_differs_from_the_equipped_toy_then_it_is_dropped() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        sim.apply(GameEvent::Equip {
            session_id: 1,
            kind: ToyKind::Ball,
        });
        let outbound = sim.apply(GameEvent::Action {
            session_id: 1,
            kind: ToyKind::Bat,
            target: Vec2::new(0.0, 0.0),
            correlation_id: "c-2".to_string(),
        });
        assert!(outbound.is_empty());
    }

    #[test]
    fn when_an_action_target_is_outside_the_space_then_it_is_clamped() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        sim.apply(GameEvent::Equip {
            session_id: 1,
            kind: ToyKind::Ball,
        });
        let outbound = sim.apply(GameEvent::Action {
            session_id: 1,
            kind: ToyKind::Ball,
            target: Vec2::new(-50.0, 99_999.0),
            correlation_id: "c-3".to_string(),
        });
        let SessionEvent::Action(action) = &outbound[0].event else {
            panic!("expected an action event");
        };
        assert_eq!(action.target.x, 0.0);
        assert_eq!(action.target.y, 1080.0);
        assert_eq!(action.correlation_id, "c-3");
    }

    #[test]
    fn when_a_second_session_claims_a_taken_name_then_it_is_kicked() {
        let mut sim = sim();
        let first = join(&mut sim, 1, "Sam");
        assert!(kicked_sessions(&first).is_empty());

        sim.step(DT);
        let second = join(&mut sim, 2, "sam");
        assert_eq!(kicked_sessions(&second), vec![2]);
        assert!(sim.player(2).is_none());
        assert_eq!(sim.player(1).unwrap().name.as_deref(), Some("Sam"));

        // Still taken: the eviction of 2 did not free the name.
        sim.step(DT);
        let third = join(&mut sim, 3, "SAM");
        assert_eq!(kicked_sessions(&third), vec![3]);

        // Only the owner's disconnect frees it.
        sim.apply(GameEvent::Leave { session_id: 1 });
        let fourth = join(&mut sim, 4, "Sam");
        assert!(kicked_sessions(&fourth).is_empty());
        assert_eq!(sim.player(4).unwrap().name.as_deref(), Some("Sam"));
    }

    #[test]
    fn when_the_sweep_runs_then_residual_duplicates_are_evicted() {
        let mut sim = sim();
        join(&mut sim, 1, "Sam");
        join(&mut sim, 2, "Ada");
        // Simulate a lost race: both records ended up holding the same name.
        sim.players.get_mut(&2).unwrap().name = Some("sam".to_string());

        // Sweep cadence is 15s of sim time.
        let mut kicked = Vec::new();
        for _ in 0..320 {
            let (_, outbound) = sim.step(DT);
            kicked.extend(kicked_sessions(&outbound));
        }
        assert_eq!(kicked, vec![2]);
        assert!(sim.player(2).is_none());
        assert!(sim.player(1).is_some());
    }

    #[test]
    fn when_chatting_twice_quickly_then_the_second_message_is_dropped() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        sim.apply(GameEvent::Chat {
            session_id: 1,
            text: "hello   there".to_string(),
        });
        assert_eq!(
            sim.player(1).unwrap().chat.as_ref().map(|c| c.text.as_str()),
            Some("hello there")
        );

        sim.apply(GameEvent::Chat {
            session_id: 1,
            text: "too fast".to_string(),
        });
        assert_eq!(
            sim.player(1).unwrap().chat.as_ref().map(|c| c.text.as_str()),
            Some("hello there")
        );

        // After the throttle window the next message lands.
        for _ in 0..13 {
            sim.step(DT);
        }
        sim.apply(GameEvent::Chat {
            session_id: 1,
            text: "second".to_string(),
        });
        assert_eq!(
            sim.player(1).unwrap().chat.as_ref().map(|c| c.text.as_str()),
            Some("second")
        );
    }

    #[test]
    fn when_the_chat_ttl_elapses_then_the_bubble_expires() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        sim.apply(GameEvent::Chat {
            session_id: 1,
            text: "bye".to_string(),
        });
        assert!(sim.player(1).unwrap().chat.is_some());

        for _ in 0..121 {
            sim.step(DT);
        }
        assert!(sim.player(1).unwrap().chat.is_none());
    }

    #[test]
    fn when_a_snapshot_is_taken_then_only_named_players_appear_in_id_order() {
        let mut sim = sim();
        join(&mut sim, 2, "B");
        join(&mut sim, 1, "A");
        sim.apply(GameEvent::Connect { session_id: 3 });

        let (snapshot, _) = sim.step(DT);
        let ids: Vec<_> = snapshot.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(snapshot.server_ts >= 1_700_000_000_000);
    }

    #[test]
    fn when_a_player_is_in_a_subroom_then_lobby_players_cannot_be_hit() {
        let mut sim = sim();
        join(&mut sim, 1, "A");
        join(&mut sim, 2, "B");
        sim.apply(GameEvent::EnterRoom {
            session_id: 1,
            room_id: "gym".to_string(),
        });
        sim.apply(GameEvent::EnterSubroom {
            session_id: 2,
            room_id: "gym".to_string(),
            subroom_id: "locker-room".to_string(),
        });
        // Same interior coordinates, different spaces.
        sim.players.get_mut(&1).unwrap().room_pos = Vec2::new(200.0, 200.0);
        sim.players.get_mut(&2).unwrap().room_pos = Vec2::new(220.0, 200.0);

        sim.apply(GameEvent::Equip {
            session_id: 1,
            kind: ToyKind::Bat,
        });
        let outbound = sim.apply(GameEvent::Action {
            session_id: 1,
            kind: ToyKind::Bat,
            target: Vec2::new(260.0, 200.0),
            correlation_id: "c-4".to_string(),
        });
        assert!(
            !outbound
                .iter()
                .any(|o| matches!(o.event, SessionEvent::Hit(_)))
        );
    }
}
