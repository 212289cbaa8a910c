//! Authoritative world simulation.
//!
//! The world owns every entity behind one mutex. The tick loop holds it for
//! a whole step and every other reader (executor handlers, lookups,
//! snapshots) goes through the same lock, so there is no unsynchronised path
//! to entity state.
//!
//! Step order per active entity, in insertion order:
//! 1. tick hook (pawn velocity easing)
//! 2. candidate position = position + velocity * dt
//! 3. out of bounds: zero planar velocity, keep position
//! 4. first contact with another collidable entity: both collision hooks
//!    run, position is kept
//! 5. otherwise the candidate is committed

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use arena_shared::{
    config::{ArenaConfig, ServerConfig, SimTuning},
    ids::EntityId,
    math::Vec3,
};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{
    entity::{Body, Entity, EntityKind, Pawn},
    pacer::FramePacer,
    store::EntityStore,
};

/// Attempts made to find a non-overlapping spawn point.
const SPAWN_ATTEMPTS: usize = 32;

/// Hands out entity ids for one world: random session epoch plus counter.
#[derive(Debug)]
pub struct IdAllocator {
    epoch: u32,
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            next: AtomicU32::new(1),
        }
    }

    pub fn random() -> Self {
        Self::new(rand::random())
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn next_id(&self) -> EntityId {
        EntityId::from_parts(self.epoch, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Counters for one simulation step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub ticked: usize,
    pub out_of_bounds: usize,
    pub collisions: usize,
    pub failures: usize,
}

/// Read-only copy of an entity for radar replies and observers.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f64,
    pub destroyed: bool,
}

impl From<&Entity> for EntitySnapshot {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id(),
            kind: e.kind(),
            position: e.position,
            velocity: e.velocity,
            radius: e.radius,
            destroyed: e.is_destroyed(),
        }
    }
}

pub struct World {
    arena: ArenaConfig,
    tuning: SimTuning,
    tick_hz: u32,
    ids: IdAllocator,
    store: Mutex<EntityStore>,
    running: AtomicBool,
}

impl World {
    pub fn new(arena: ArenaConfig, tuning: SimTuning, tick_hz: u32) -> Self {
        Self {
            arena,
            tuning,
            tick_hz: tick_hz.max(1),
            ids: IdAllocator::random(),
            store: Mutex::new(EntityStore::default()),
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self::new(cfg.arena.clone(), cfg.tuning.clone(), cfg.tick_hz)
    }

    pub fn arena(&self) -> &ArenaConfig {
        &self.arena
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }

    pub fn size_x(&self) -> f64 {
        self.arena.size_x
    }

    pub fn size_y(&self) -> f64 {
        self.arena.size_y
    }

    pub fn epoch(&self) -> u32 {
        self.ids.epoch()
    }

    /// Simulated seconds per step.
    pub fn frame_dt(&self) -> f64 {
        1.0 / self.tick_hz as f64
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, EntityStore> {
        // A panic mid-step leaves entity data intact; keep serving it.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the entity store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut EntityStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn with_entity<R>(&self, id: EntityId, f: impl FnOnce(&Entity) -> R) -> Option<R> {
        self.lock().get(id).map(f)
    }

    pub fn with_entity_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    pub fn find(&self, id: EntityId) -> Option<Entity> {
        self.with_entity(id, Entity::clone)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies every entity, destroyed ones included.
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.lock().iter().map(EntitySnapshot::from).collect()
    }

    pub fn spawn(&self, body: Body, position: Vec3, radius: f64) -> EntityId {
        let entity = Entity::new(self.ids.next_id(), body, position, radius);
        self.lock().insert(entity)
    }

    pub fn spawn_pawn(&self, position: Vec3) -> EntityId {
        let id = self.spawn(Body::Pawn(Pawn::default()), position, self.tuning.pawn_radius);
        info!(entity = %id, x = position.x, y = position.y, "Spawned pawn");
        id
    }

    pub fn spawn_wall(&self, position: Vec3, radius: f64) -> EntityId {
        self.spawn(Body::Wall, position, radius)
    }

    pub fn spawn_boost(&self, position: Vec3) -> EntityId {
        self.spawn(Body::Boost, position, 1.0)
    }

    pub fn in_bounds(&self, p: Vec3) -> bool {
        in_bounds(&self.arena, p)
    }

    /// Uniform point inside the arena. A degenerate size collapses to 0.
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Vec3 {
        Vec3::xy(
            rng.gen_range(0.0..=extent(self.arena.size_x)),
            rng.gen_range(0.0..=extent(self.arena.size_y)),
        )
    }

    /// Random position that does not overlap an active collidable entity,
    /// falling back to the last sample after a bounded number of attempts.
    pub fn random_free_position<R: Rng>(&self, radius: f64, rng: &mut R) -> Vec3 {
        let store = self.lock();
        let mut candidate = self.random_position(rng);
        for _ in 1..SPAWN_ATTEMPTS {
            let blocked = store.iter().any(|e| {
                e.is_collidable() && candidate.distance_2d(e.position) < e.radius + radius
            });
            if !blocked {
                break;
            }
            candidate = self.random_position(rng);
        }
        candidate
    }

    pub fn generate_random_walls<R: Rng>(&self, count: usize, radius: f64, rng: &mut R) {
        for _ in 0..count {
            let pos = self.random_position(rng);
            let id = self.spawn_wall(pos, radius);
            debug!(entity = %id, x = pos.x, y = pos.y, "Wall created");
        }
    }

    /// Ring of unit walls just inside the arena edges.
    pub fn generate_wall_bounds(&self) {
        let (sx, sy) = (self.arena.size_x, self.arena.size_y);
        for x in 0..sx.max(0.0) as usize {
            self.spawn_wall(Vec3::xy(x as f64, 1.0), 1.0);
            self.spawn_wall(Vec3::xy(x as f64, sy - 1.0), 1.0);
        }
        for y in 0..sy.max(0.0) as usize {
            self.spawn_wall(Vec3::xy(1.0, y as f64), 1.0);
            self.spawn_wall(Vec3::xy(sx - 1.0, y as f64), 1.0);
        }
    }

    pub fn generate_random_boosts<R: Rng>(&self, count: usize, rng: &mut R) {
        for _ in 0..count {
            let pos = self.random_position(rng);
            let id = self.spawn_boost(pos);
            debug!(entity = %id, x = pos.x, y = pos.y, "Boost created");
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&self, dt: f64) -> StepReport {
        let mut store = self.lock();
        step_store(&mut store, &self.arena, &self.tuning, dt)
    }

    /// Starts the tick loop on the tokio runtime.
    pub fn start(self: &Arc<Self>) -> WorldHandle {
        self.running.store(true, Ordering::Release);
        let world = Arc::clone(self);
        let task = tokio::spawn(async move { world.run().await });
        info!(epoch = self.epoch(), "World started");
        WorldHandle {
            world: Arc::clone(self),
            task: Some(task),
        }
    }

    async fn run(&self) {
        let mut pacer = FramePacer::from_hz(self.tick_hz, Instant::now());
        let dt = self.frame_dt();
        while self.is_running() {
            if let Some(dropped) = pacer.poll(Instant::now()) {
                if dropped > 0 {
                    debug!(dropped, "World lagging, dropped frames");
                }
                let report = self.step(dt);
                trace!(?report, "World step");
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Owner handle for a running tick loop. Dropping it stops the loop
/// without waiting for it.
pub struct WorldHandle {
    world: Arc<World>,
    task: Option<JoinHandle<()>>,
}

impl WorldHandle {
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Clears the run flag and waits for the loop to exit.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        info!("Stopping the world");
        self.world.running.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.await.context("join world task")?;
        }
        info!("World stopped");
        Ok(())
    }
}

impl Drop for WorldHandle {
    fn drop(&mut self) {
        if self.task.is_some() && self.world.running.swap(false, Ordering::AcqRel) {
            debug!("World handle dropped, tick loop told to stop");
        }
    }
}

fn extent(size: f64) -> f64 {
    if size.is_finite() {
        size.max(0.0)
    } else {
        0.0
    }
}

fn in_bounds(arena: &ArenaConfig, p: Vec3) -> bool {
    (0.0..=arena.size_x).contains(&p.x) && (0.0..=arena.size_y).contains(&p.y)
}

fn step_store(store: &mut EntityStore, arena: &ArenaConfig, tuning: &SimTuning, dt: f64) -> StepReport {
    let mut report = StepReport::default();

    for slot in 0..store.len() {
        let entity = store.at_mut(slot);
        if entity.is_destroyed() {
            continue;
        }

        if let Err(e) = entity.tick(tuning) {
            warn!(entity = %entity.id(), error = %e, "Could not tick entity");
            report.failures += 1;
            continue;
        }
        report.ticked += 1;

        let candidate = entity.position.add(entity.velocity.scale(dt));
        if !in_bounds(arena, candidate) {
            entity.velocity.x = 0.0;
            entity.velocity.y = 0.0;
            report.out_of_bounds += 1;
            continue;
        }

        if let Some(other) = first_contact(store, slot, candidate) {
            let (me, them) = store.pair_mut(slot, other);
            them.on_collision(me, tuning);
            me.on_collision(them, tuning);
            report.collisions += 1;
            continue;
        }

        store.at_mut(slot).position = candidate;
    }

    report
}

fn first_contact(store: &EntityStore, slot: usize, candidate: Vec3) -> Option<usize> {
    let me = store.at(slot);
    if me.radius == 0.0 {
        return None;
    }
    store
        .iter()
        .enumerate()
        .find(|(i, other)| {
            *i != slot
                && other.is_collidable()
                && candidate.distance_2d(other.position) < me.radius + other.radius
        })
        .map(|(i, _)| i)
}
