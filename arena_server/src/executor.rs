//! Session driver.
//!
//! Once per frame the executor walks the live player peers, lazily spawns
//! their pawns, sends each one its player data and dispatches at most one
//! inbound message per peer. It never owns entity state: every read and
//! write goes through the world's lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use arena_shared::{
    config::{ArenaFeatures, SimTuning},
    ids::{EntityId, PeerId},
    math::Vec3,
    net::{
        ClientMsg, GameEndedReason, PlayerData, RadarResult, RadarReturn, ServerMsg,
        ShootFailReason, ShootRequest, ShootResult, WorldOptions,
    },
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    entity::{Entity, EntityKind},
    pacer::steady_interval,
    peer::{Peer, PeerKind},
    registry::PeerRegistry,
    store::EntityStore,
    visualizer::{ShotTrace, Visualizer},
    world::World,
};

/// Result of one frame pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// At least two players were seen and exactly one pawn is still alive.
    Ended { winner: Option<EntityId> },
}

/// How a run loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub winner: Option<EntityId>,
    pub frames: u64,
    pub timed_out: bool,
}

pub struct Executor {
    registry: Arc<PeerRegistry>,
    world: Arc<World>,
    visualizer: Arc<dyn Visualizer>,
    pawns: HashMap<PeerId, EntityId>,
    rng: StdRng,
    frame_interval: Duration,
    frames: u64,
}

impl Executor {
    pub fn new(
        registry: Arc<PeerRegistry>,
        world: Arc<World>,
        visualizer: Arc<dyn Visualizer>,
        frame_interval: Duration,
    ) -> Self {
        Self {
            registry,
            world,
            visualizer,
            pawns: HashMap::new(),
            rng: StdRng::from_entropy(),
            frame_interval,
            frames: 0,
        }
    }

    /// Replaces the spawn-position generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn pawn_of(&self, peer: PeerId) -> Option<EntityId> {
        self.pawns.get(&peer).copied()
    }

    /// Runs frames until the game ends.
    pub async fn run(&mut self) -> RunResult {
        self.run_until(None).await
    }

    /// Runs frames until the game ends or `limit` elapses.
    pub async fn run_for(&mut self, limit: Duration) -> RunResult {
        info!(seconds = limit.as_secs_f32(), "Processing world with time limit");
        self.run_until(Some(tokio::time::Instant::now() + limit)).await
    }

    async fn run_until(&mut self, deadline: Option<tokio::time::Instant>) -> RunResult {
        let mut ticker = steady_interval(self.frame_interval);
        let mut result = RunResult {
            winner: None,
            frames: 0,
            timed_out: false,
        };
        loop {
            ticker.tick().await;
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                info!("Session time limit reached");
                result.timed_out = true;
                break;
            }
            if let FrameOutcome::Ended { winner } = self.process_frame() {
                result.winner = winner;
                break;
            }
        }
        result.frames = self.frames;
        self.broadcast_game_ended();
        result
    }

    /// One pass over every live player peer.
    pub fn process_frame(&mut self) -> FrameOutcome {
        let mut players = 0usize;
        let mut alive = 0usize;
        let mut winner = None;

        for peer in self.registry.peers() {
            if peer.kind() != PeerKind::Player || peer.is_dead() {
                continue;
            }
            if let Err(e) = self.process_peer(&peer) {
                warn!(peer = %peer.id(), error = %format!("{e:#}"), "Peer processing failed");
                peer.mark_dead();
            }
            players += 1;
            if let Some(pawn) = self.live_pawn(&peer) {
                alive += 1;
                winner = Some(pawn);
            }
        }
        self.frames += 1;

        if players >= 2 && alive == 1 {
            info!(winner = ?winner, players, "Game has ended, all but one pawn are dead");
            return FrameOutcome::Ended { winner };
        }
        FrameOutcome::Continue
    }

    /// Tells every player peer that the game is over.
    pub fn broadcast_game_ended(&self) {
        for peer in self.registry.peers() {
            if !peer.is_player() {
                continue;
            }
            let msg = ServerMsg::GameEnded {
                reason: GameEndedReason::GameStopped,
            };
            if let Err(e) = peer.queue_message(msg) {
                debug!(peer = %peer.id(), error = %e, "Could not queue game_ended");
            }
        }
        info!("Broadcasted game_ended");
    }

    fn live_pawn(&self, peer: &Peer) -> Option<EntityId> {
        let pawn = self.pawn_of(peer.id())?;
        self.world
            .with_entity(pawn, |e| !e.is_destroyed())
            .unwrap_or(false)
            .then_some(pawn)
    }

    fn process_peer(&mut self, peer: &Peer) -> anyhow::Result<()> {
        let pawn = self.ensure_pawn(peer)?;
        self.send_player_data(peer, pawn)?;

        let Some(msg) = peer.pop_message() else {
            return Ok(());
        };
        match msg {
            ClientMsg::WorldInfoRequest => self.handle_world_info(peer),
            ClientMsg::SetSpeed { x, y, z } => self.handle_set_speed(pawn, Vec3::new(x, y, z)),
            ClientMsg::RadarPing => self.handle_radar_ping(peer),
            ClientMsg::Shoot(request) => self.handle_shoot(peer, pawn, request, Instant::now()),
            ClientMsg::ClientInit { spectator } => {
                // Normally consumed by the reader task.
                if spectator {
                    peer.set_kind(PeerKind::Spectator);
                }
                Ok(())
            }
        }
    }

    fn ensure_pawn(&mut self, peer: &Peer) -> anyhow::Result<EntityId> {
        if let Some(pawn) = self.pawn_of(peer.id()) {
            return Ok(pawn);
        }
        let radius = self.world.tuning().pawn_radius;
        let position = self.world.random_free_position(radius, &mut self.rng);
        let pawn = self.world.spawn_pawn(position);
        self.pawns.insert(peer.id(), pawn);
        peer.queue_message(ServerMsg::GameStarted)?;
        info!(peer = %peer.id(), entity = %pawn, "Player spawned and notified");
        Ok(pawn)
    }

    fn send_player_data(&self, peer: &Peer, pawn: EntityId) -> anyhow::Result<()> {
        let data = self
            .world
            .with_entity(pawn, player_data)
            .flatten()
            .with_context(|| format!("pawn {pawn} missing from world"))?;
        peer.queue_message(ServerMsg::PlayerData(data))
    }

    fn handle_world_info(&self, peer: &Peer) -> anyhow::Result<()> {
        let arena = self.world.arena();
        let features = arena.features();
        peer.queue_message(ServerMsg::WorldOptions(WorldOptions {
            map_x: arena.size_x,
            map_y: arena.size_y,
            auto_shoot_allowed: features.contains(ArenaFeatures::AUTO_SHOOT),
            grid_based: features.contains(ArenaFeatures::GRID_BASED),
            max_players: arena.max_players,
            radar_enabled: features.contains(ArenaFeatures::RADAR),
        }))
    }

    fn handle_set_speed(&self, pawn: EntityId, target: Vec3) -> anyhow::Result<()> {
        self.world
            .with_entity_mut(pawn, |e| e.pawn_mut().map(|p| p.set_target_velocity(target)))
            .flatten()
            .with_context(|| format!("pawn {pawn} missing from world"))
    }

    fn handle_radar_ping(&self, peer: &Peer) -> anyhow::Result<()> {
        let returns = if self.world.arena().features().contains(ArenaFeatures::RADAR) {
            self.world
                .snapshot()
                .into_iter()
                .map(|s| RadarReturn {
                    id: s.id,
                    position: s.position,
                    speed: s.velocity,
                    return_type: s.kind.radar_type(),
                })
                .collect()
        } else {
            Vec::new()
        };
        peer.queue_message(ServerMsg::RadarResult(RadarResult { returns }))
    }

    fn handle_shoot(
        &self,
        peer: &Peer,
        pawn: EntityId,
        request: ShootRequest,
        now: Instant,
    ) -> anyhow::Result<()> {
        let tuning = self.world.tuning();
        let (result, trace) = self
            .world
            .with_store(|store| resolve_shot(store, pawn, request, now, tuning))?;

        if let Some(trace) = trace {
            self.visualizer.draw_shot(trace.start, trace.end);
        }
        peer.queue_message(ServerMsg::ShootResult(result))
    }
}

fn player_data(e: &Entity) -> Option<PlayerData> {
    let pawn = e.pawn()?;
    Some(PlayerData {
        id: e.id(),
        position: e.position,
        speed: e.velocity,
        armor: pawn.armor(),
        health: pawn.health(),
        score: pawn.score(),
        alive: !e.is_destroyed(),
    })
}

/// Resolves a shot atomically against the store.
fn resolve_shot(
    store: &mut EntityStore,
    shooter: EntityId,
    request: ShootRequest,
    now: Instant,
    tuning: &SimTuning,
) -> anyhow::Result<(ShootResult, Option<ShotTrace>)> {
    let entity = store
        .get_mut(shooter)
        .with_context(|| format!("shooter {shooter} missing from world"))?;
    let origin = entity.position;
    let pawn = entity.pawn_mut().context("shooter is not a pawn")?;

    if !pawn.register_shot(now, tuning.shot_cooldown()) {
        warn!(entity = %shooter, "Shot denied, cooldown");
        return Ok((ShootResult::failed(ShootFailReason::Cooldown), None));
    }

    match request {
        ShootRequest::Target { target_id } => {
            info!(entity = %shooter, target = %target_id, "Targeted shot");
            Ok((shoot_target(store, target_id, tuning), None))
        }
        ShootRequest::Angle { angle } => {
            info!(entity = %shooter, angle, "Angle shot");
            Ok(shoot_ray(store, shooter, origin, angle, tuning))
        }
    }
}

fn shoot_target(store: &mut EntityStore, target_id: EntityId, tuning: &SimTuning) -> ShootResult {
    let Some(target) = store.get_mut(target_id) else {
        return ShootResult::failed(ShootFailReason::InvalidTarget);
    };
    if target.is_destroyed() || target.kind() != EntityKind::Pawn {
        return ShootResult::failed(ShootFailReason::InvalidTarget);
    }
    let destroyed = target.apply_damage(tuning.shot_damage).unwrap_or(false);
    ShootResult {
        success: true,
        target_id: Some(target_id),
        damage: Some(tuning.shot_damage),
        target_destroyed: destroyed,
        fail_reason: None,
    }
}

fn shoot_ray(
    store: &mut EntityStore,
    shooter: EntityId,
    origin: Vec3,
    angle: f64,
    tuning: &SimTuning,
) -> (ShootResult, Option<ShotTrace>) {
    let direction = Vec3::from_angle(angle);
    let Some(slot) = cast_ray(store, shooter, origin, direction, tuning.ray_step, tuning.ray_range)
    else {
        return (ShootResult::failed(ShootFailReason::Miss), None);
    };

    let target = store.at_mut(slot);
    let mut result = ShootResult {
        success: true,
        target_id: Some(target.id()),
        damage: Some(tuning.shot_damage),
        ..Default::default()
    };
    let end = target.position;

    if let Some(destroyed) = target.apply_damage(tuning.shot_damage) {
        let mut award = tuning.hit_score;
        if destroyed {
            award += tuning.kill_score;
            result.target_destroyed = true;
        }
        if let Some(pawn) = store.get_mut(shooter).and_then(Entity::pawn_mut) {
            pawn.add_score(award);
        }
    }

    (result, Some(ShotTrace { start: origin, end }))
}

/// Steps along the ray and returns the slot of the first entity whose
/// radius contains a sample point.
pub fn cast_ray(
    store: &EntityStore,
    shooter: EntityId,
    origin: Vec3,
    direction: Vec3,
    step: f64,
    range: f64,
) -> Option<usize> {
    if step <= 0.0 {
        return None;
    }
    let delta = Vec3::xy(direction.x * step, direction.y * step);
    let mut point = origin;
    let mut travelled = 0.0;
    while travelled < range {
        point = point.add(delta);
        let hit = store.iter().position(|e| {
            e.id() != shooter && e.is_collidable() && point.distance_2d(e.position) <= e.radius
        });
        if hit.is_some() {
            return hit;
        }
        travelled += step;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerIo;
    use crate::visualizer::ChannelVisualizer;
    use arena_shared::config::ArenaConfig;
    use arena_shared::net::RadarReturnType;

    struct Harness {
        world: Arc<World>,
        registry: Arc<PeerRegistry>,
        vis: Arc<ChannelVisualizer>,
        exec: Executor,
    }

    fn harness_with(arena: ArenaConfig, tuning: SimTuning) -> Harness {
        let world = Arc::new(World::new(arena, tuning, 60));
        let registry = Arc::new(PeerRegistry::default());
        let vis = Arc::new(ChannelVisualizer::new(16));
        let exec = Executor::new(
            Arc::clone(&registry),
            Arc::clone(&world),
            vis.clone(),
            Duration::from_millis(10),
        )
        .with_rng(StdRng::seed_from_u64(42));
        Harness {
            world,
            registry,
            vis,
            exec,
        }
    }

    fn harness() -> Harness {
        harness_with(ArenaConfig::default(), SimTuning::default())
    }

    fn join(h: &Harness) -> (Arc<Peer>, PeerIo) {
        let (peer, io) = Peer::new(None);
        h.registry.add(Arc::clone(&peer));
        (peer, io)
    }

    fn drain(io: &mut PeerIo) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = io.outbound.try_recv() {
            out.push(msg);
        }
        out
    }

    fn shoot_result(msgs: &[ServerMsg]) -> ShootResult {
        msgs.iter()
            .find_map(|m| match m {
                ServerMsg::ShootResult(r) => Some(r.clone()),
                _ => None,
            })
            .expect("no shoot result queued")
    }

    fn place(h: &Harness, pawn: EntityId, x: f64, y: f64) {
        h.world.with_entity_mut(pawn, |e| e.position = Vec3::xy(x, y));
    }

    fn score(h: &Harness, pawn: EntityId) -> i64 {
        h.world
            .with_entity(pawn, |e| e.pawn().map(|p| p.score()))
            .flatten()
            .unwrap()
    }

    #[test]
    fn first_frame_spawns_pawn_and_notifies() {
        let mut h = harness();
        let (peer, mut io) = join(&h);

        assert_eq!(h.exec.process_frame(), FrameOutcome::Continue);

        let pawn = h.exec.pawn_of(peer.id()).unwrap();
        assert!(h.world.in_bounds(h.world.find(pawn).unwrap().position));
        let msgs = drain(&mut io);
        assert_eq!(msgs[0], ServerMsg::GameStarted);
        assert!(matches!(&msgs[1], ServerMsg::PlayerData(d) if d.id == pawn && d.health == 100 && d.alive));

        h.exec.process_frame();
        let msgs = drain(&mut io);
        assert_eq!(msgs.len(), 1, "no second spawn: {msgs:?}");
        assert_eq!(h.world.len(), 1);
    }

    #[test]
    fn spectators_and_dead_peers_are_skipped() {
        let mut h = harness();
        let (spectator, mut spec_io) = join(&h);
        spectator.set_kind(PeerKind::Spectator);
        let (dead, _dead_io) = join(&h);
        dead.mark_dead();

        h.exec.process_frame();
        assert!(h.exec.pawn_of(spectator.id()).is_none());
        assert!(h.exec.pawn_of(dead.id()).is_none());
        assert!(drain(&mut spec_io).is_empty());
    }

    #[test]
    fn world_info_reply() {
        let mut h = harness();
        let (_peer, mut io) = join(&h);
        io.inbound.send(ClientMsg::WorldInfoRequest).unwrap();
        h.exec.process_frame();

        let opts = drain(&mut io)
            .into_iter()
            .find_map(|m| match m {
                ServerMsg::WorldOptions(o) => Some(o),
                _ => None,
            })
            .unwrap();
        assert_eq!(opts.map_x, 100.0);
        assert_eq!(opts.max_players, 32);
        assert!(opts.radar_enabled);
        assert!(!opts.auto_shoot_allowed);
    }

    #[test]
    fn one_message_per_frame() {
        let mut h = harness();
        let (peer, mut io) = join(&h);
        io.inbound
            .send(ClientMsg::SetSpeed {
                x: 3.0,
                y: -2.0,
                z: 0.0,
            })
            .unwrap();
        io.inbound.send(ClientMsg::RadarPing).unwrap();

        h.exec.process_frame();
        let pawn = h.exec.pawn_of(peer.id()).unwrap();
        let target = h
            .world
            .with_entity(pawn, |e| e.pawn().unwrap().target_velocity())
            .unwrap();
        assert_eq!(target, Vec3::new(3.0, -2.0, 0.0));
        assert!(!drain(&mut io)
            .iter()
            .any(|m| matches!(m, ServerMsg::RadarResult(_))));

        h.exec.process_frame();
        assert!(drain(&mut io)
            .iter()
            .any(|m| matches!(m, ServerMsg::RadarResult(_))));
    }

    #[test]
    fn radar_classifies_entities() {
        let mut h = harness();
        let wall = h.world.spawn_wall(Vec3::xy(10.0, 10.0), 2.0);
        let boost = h.world.spawn_boost(Vec3::xy(90.0, 90.0));
        let (_peer, mut io) = join(&h);
        io.inbound.send(ClientMsg::RadarPing).unwrap();
        h.exec.process_frame();

        let radar = drain(&mut io)
            .into_iter()
            .find_map(|m| match m {
                ServerMsg::RadarResult(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(radar.returns.len(), 3);
        let kind_of = |id| radar.returns.iter().find(|r| r.id == id).unwrap().return_type;
        assert_eq!(kind_of(wall), RadarReturnType::Wall);
        assert_eq!(kind_of(boost), RadarReturnType::Boost);
        assert_eq!(
            radar
                .returns
                .iter()
                .filter(|r| r.return_type == RadarReturnType::Player)
                .count(),
            1
        );
    }

    #[test]
    fn radar_disabled_returns_nothing() {
        let mut h = harness_with(
            ArenaConfig {
                radar_enabled: false,
                ..Default::default()
            },
            SimTuning::default(),
        );
        h.world.spawn_wall(Vec3::xy(10.0, 10.0), 2.0);
        let (_peer, mut io) = join(&h);
        io.inbound.send(ClientMsg::RadarPing).unwrap();
        h.exec.process_frame();
        let msgs = drain(&mut io);
        assert!(msgs
            .iter()
            .any(|m| matches!(m, ServerMsg::RadarResult(r) if r.returns.is_empty())));
    }

    #[test]
    fn targeted_shot_and_cooldown() {
        let mut h = harness();
        let (a, mut a_io) = join(&h);
        let (b, _b_io) = join(&h);
        h.exec.process_frame();
        let b_pawn = h.exec.pawn_of(b.id()).unwrap();
        drain(&mut a_io);

        a_io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Target { target_id: b_pawn }))
            .unwrap();
        h.exec.process_frame();
        let r = shoot_result(&drain(&mut a_io));
        assert!(r.success);
        assert_eq!(r.target_id, Some(b_pawn));
        assert_eq!(r.damage, Some(50));
        assert!(!r.target_destroyed);

        a_io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Target { target_id: b_pawn }))
            .unwrap();
        h.exec.process_frame();
        let r = shoot_result(&drain(&mut a_io));
        assert!(!r.success);
        assert_eq!(r.fail_reason, Some(ShootFailReason::Cooldown));

        let health = h
            .world
            .with_entity(b_pawn, |e| e.pawn().unwrap().health())
            .unwrap();
        assert_eq!(health, 50);
        assert!(h.exec.pawn_of(a.id()).is_some());
    }

    #[test]
    fn targeted_shot_at_wall_is_invalid() {
        let mut h = harness();
        let wall = h.world.spawn_wall(Vec3::xy(10.0, 10.0), 2.0);
        let (_a, mut io) = join(&h);
        io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Target { target_id: wall }))
            .unwrap();
        h.exec.process_frame();
        let r = shoot_result(&drain(&mut io));
        assert!(!r.success);
        assert_eq!(r.fail_reason, Some(ShootFailReason::InvalidTarget));
    }

    #[test]
    fn ray_cast_kill_scores_and_ends_game() {
        let tuning = SimTuning {
            shot_cooldown_secs: 0.0,
            ..Default::default()
        };
        let mut h = harness_with(ArenaConfig::default(), tuning);
        let mut traces = h.vis.subscribe();
        let (a, mut a_io) = join(&h);
        let (b, _b_io) = join(&h);
        h.exec.process_frame();
        let a_pawn = h.exec.pawn_of(a.id()).unwrap();
        let b_pawn = h.exec.pawn_of(b.id()).unwrap();
        place(&h, a_pawn, 20.0, 50.0);
        place(&h, b_pawn, 40.0, 50.0);
        drain(&mut a_io);

        a_io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Angle { angle: 0.0 }))
            .unwrap();
        assert_eq!(h.exec.process_frame(), FrameOutcome::Continue);
        let r = shoot_result(&drain(&mut a_io));
        assert!(r.success);
        assert_eq!(r.target_id, Some(b_pawn));
        assert_eq!(r.damage, Some(50));
        assert!(!r.target_destroyed);
        assert_eq!(score(&h, a_pawn), 20);

        let trace = traces.try_recv().unwrap();
        assert_eq!(trace.start, Vec3::xy(20.0, 50.0));
        assert_eq!(trace.end, Vec3::xy(40.0, 50.0));

        a_io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Angle { angle: 0.0 }))
            .unwrap();
        let outcome = h.exec.process_frame();
        let r = shoot_result(&drain(&mut a_io));
        assert!(r.target_destroyed);
        assert_eq!(score(&h, a_pawn), 20 + 20 + 50);
        assert_eq!(
            outcome,
            FrameOutcome::Ended {
                winner: Some(a_pawn)
            }
        );
    }

    #[test]
    fn ray_cast_miss() {
        let mut h = harness();
        let (a, mut io) = join(&h);
        h.exec.process_frame();
        let pawn = h.exec.pawn_of(a.id()).unwrap();
        place(&h, pawn, 20.0, 50.0);

        io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Angle {
                angle: std::f64::consts::PI,
            }))
            .unwrap();
        h.exec.process_frame();
        let r = shoot_result(&drain(&mut io));
        assert!(!r.success);
        assert_eq!(r.fail_reason, Some(ShootFailReason::Miss));
        assert_eq!(r.target_id, None);
    }

    #[test]
    fn ray_cast_hits_wall_without_score() {
        let mut h = harness();
        let wall = h.world.spawn_wall(Vec3::xy(30.0, 50.0), 2.0);
        let (a, mut io) = join(&h);
        h.exec.process_frame();
        let pawn = h.exec.pawn_of(a.id()).unwrap();
        place(&h, pawn, 20.0, 50.0);

        io.inbound
            .send(ClientMsg::Shoot(ShootRequest::Angle { angle: 0.0 }))
            .unwrap();
        h.exec.process_frame();
        let r = shoot_result(&drain(&mut io));
        assert!(r.success);
        assert_eq!(r.target_id, Some(wall));
        assert_eq!(score(&h, pawn), 0);
    }

    #[test]
    fn fewer_than_two_players_never_end() {
        let mut h = harness();
        assert_eq!(h.exec.process_frame(), FrameOutcome::Continue);

        let (a, _io) = join(&h);
        h.exec.process_frame();
        let pawn = h.exec.pawn_of(a.id()).unwrap();
        h.world.with_entity_mut(pawn, |e| e.apply_damage(100));
        assert_eq!(h.exec.process_frame(), FrameOutcome::Continue);
    }

    #[test]
    fn failing_peer_is_marked_dead_without_affecting_others() {
        let mut h = harness();
        let (broken, broken_io) = join(&h);
        let (healthy, mut healthy_io) = join(&h);
        drop(broken_io);

        h.exec.process_frame();
        assert!(broken.is_dead());
        assert!(!healthy.is_dead());
        assert!(drain(&mut healthy_io).contains(&ServerMsg::GameStarted));
    }

    #[test]
    fn game_ended_goes_to_players_only() {
        let h = harness();
        let (_player, mut player_io) = join(&h);
        let (spectator, mut spec_io) = join(&h);
        spectator.set_kind(PeerKind::Spectator);

        h.exec.broadcast_game_ended();
        assert_eq!(
            drain(&mut player_io),
            vec![ServerMsg::GameEnded {
                reason: GameEndedReason::GameStopped
            }]
        );
        assert!(drain(&mut spec_io).is_empty());
    }

    #[tokio::test]
    async fn run_for_stops_at_deadline_and_broadcasts() {
        let mut h = harness();
        let (_player, mut io) = join(&h);
        let result = h.exec.run_for(Duration::from_millis(60)).await;
        assert!(result.timed_out);
        assert!(result.frames >= 1);
        assert!(drain(&mut io).contains(&ServerMsg::GameEnded {
            reason: GameEndedReason::GameStopped
        }));
    }
}
