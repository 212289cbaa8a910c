//! Simulation entities.
//!
//! Every object in the arena is an [`Entity`]: shared kinematic state plus a
//! closed [`Body`] variant that decides how it ticks and how it reacts to
//! collisions. There is no "unknown" body; the set of kinds is fixed.

use std::time::{Duration, Instant};

use arena_shared::{config::SimTuning, ids::EntityId, math::Vec3, net::RadarReturnType};
use thiserror::Error;

/// Starting (and maximum) pawn health.
pub const MAX_HEALTH: u8 = 100;

/// Failure raised by an entity's per-tick hook.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("non-finite target velocity ({x}, {y}, {z})")]
    NonFiniteTarget { x: f64, y: f64, z: f64 },
}

/// Entities are never removed during a session, only marked destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Pawn,
    Wall,
    Boost,
}

impl EntityKind {
    pub fn radar_type(self) -> RadarReturnType {
        match self {
            EntityKind::Pawn => RadarReturnType::Player,
            EntityKind::Wall => RadarReturnType::Wall,
            EntityKind::Boost => RadarReturnType::Boost,
        }
    }
}

/// Player-controlled state.
#[derive(Debug, Clone, PartialEq)]
pub struct Pawn {
    health: u8,
    armor: u32,
    score: i64,
    target_velocity: Vec3,
    last_shot: Option<Instant>,
}

impl Default for Pawn {
    fn default() -> Self {
        Self {
            health: MAX_HEALTH,
            armor: 0,
            score: 0,
            target_velocity: Vec3::ZERO,
            last_shot: None,
        }
    }
}

impl Pawn {
    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn armor(&self) -> u32 {
        self.armor
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn target_velocity(&self) -> Vec3 {
        self.target_velocity
    }

    pub fn set_target_velocity(&mut self, target: Vec3) {
        self.target_velocity = target;
    }

    pub fn add_score(&mut self, delta: i64) {
        self.score = self.score.saturating_add(delta);
    }

    pub fn add_armor(&mut self, delta: u32) {
        self.armor = self.armor.saturating_add(delta);
    }

    /// Subtracts health, never below zero. Returns true once health is zero.
    fn take_damage(&mut self, damage: u8) -> bool {
        self.health = self.health.saturating_sub(damage);
        self.health == 0
    }

    /// Records a shot at `now` unless the previous one is within `cooldown`.
    pub fn register_shot(&mut self, now: Instant, cooldown: Duration) -> bool {
        if let Some(last) = self.last_shot {
            if now.saturating_duration_since(last) < cooldown {
                return false;
            }
        }
        self.last_shot = Some(now);
        true
    }

    /// Moves `velocity` a fraction of the way towards the target on each
    /// axis, then clamps each axis to the configured maximum.
    fn ease_velocity(&self, velocity: &mut Vec3, tuning: &SimTuning) -> Result<(), TickError> {
        let target = self.target_velocity;
        if !target.is_finite() {
            return Err(TickError::NonFiniteTarget {
                x: target.x,
                y: target.y,
                z: target.z,
            });
        }
        let rate = tuning.easing_rate;
        let [max_x, max_y, max_z] = tuning.max_speed;
        velocity.x = ease_axis(velocity.x, target.x, rate, max_x);
        velocity.y = ease_axis(velocity.y, target.y, rate, max_y);
        velocity.z = ease_axis(velocity.z, target.z, rate, max_z);
        Ok(())
    }
}

fn ease_axis(current: f64, target: f64, rate: f64, max: f64) -> f64 {
    if current == target {
        return current;
    }
    (current + rate * (target - current)).clamp(-max, max)
}

/// Kind-specific state.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Pawn(Pawn),
    /// Static obstacle; stops whatever runs into it.
    Wall,
    /// One-shot pickup.
    Boost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Zero disables collisions in both directions.
    pub radius: f64,
    lifecycle: Lifecycle,
    body: Body,
}

impl Entity {
    pub fn new(id: EntityId, body: Body, position: Vec3, radius: f64) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            radius,
            lifecycle: Lifecycle::Active,
            body,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        match self.body {
            Body::Pawn(_) => EntityKind::Pawn,
            Body::Wall => EntityKind::Wall,
            Body::Boost => EntityKind::Boost,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    pub fn destroy(&mut self) {
        self.lifecycle = Lifecycle::Destroyed;
    }

    pub fn is_collidable(&self) -> bool {
        !self.is_destroyed() && self.radius != 0.0
    }

    pub fn pawn(&self) -> Option<&Pawn> {
        match &self.body {
            Body::Pawn(p) => Some(p),
            _ => None,
        }
    }

    pub fn pawn_mut(&mut self) -> Option<&mut Pawn> {
        match &mut self.body {
            Body::Pawn(p) => Some(p),
            _ => None,
        }
    }

    /// Per-tick hook. Only pawns have behaviour here.
    pub fn tick(&mut self, tuning: &SimTuning) -> Result<(), TickError> {
        match &self.body {
            Body::Pawn(pawn) => {
                let mut velocity = self.velocity;
                pawn.ease_velocity(&mut velocity, tuning)?;
                self.velocity = velocity;
                Ok(())
            }
            Body::Wall | Body::Boost => Ok(()),
        }
    }

    /// Collision response of `self` to `other`.
    pub fn on_collision(&mut self, other: &mut Entity, tuning: &SimTuning) {
        match self.body {
            Body::Pawn(_) => {}
            Body::Wall => other.velocity.zero(),
            Body::Boost => {
                if self.is_destroyed() || other.is_destroyed() {
                    return;
                }
                if let Some(pawn) = other.pawn_mut() {
                    pawn.add_score(tuning.boost_score);
                    pawn.add_armor(tuning.boost_armor);
                    self.destroy();
                }
            }
        }
    }

    /// Applies damage to a pawn. Returns `None` for other kinds, otherwise
    /// whether the pawn is now at zero health.
    pub fn apply_damage(&mut self, damage: u8) -> Option<bool> {
        let depleted = self.pawn_mut()?.take_damage(damage);
        if depleted {
            self.destroy();
        }
        Some(depleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pawn_at(seq: u32, x: f64, y: f64) -> Entity {
        Entity::new(
            EntityId::from_parts(1, seq),
            Body::Pawn(Pawn::default()),
            Vec3::xy(x, y),
            1.0,
        )
    }

    #[test]
    fn pawn_eases_towards_target_and_clamps() {
        let tuning = SimTuning::default();
        let mut e = pawn_at(1, 10.0, 10.0);
        e.pawn_mut()
            .unwrap()
            .set_target_velocity(Vec3::new(4.0, 100.0, 0.0));

        e.tick(&tuning).unwrap();
        assert_eq!(e.velocity.x, 2.0);
        assert_eq!(e.velocity.y, 10.0);
        assert_eq!(e.velocity.z, 0.0);

        e.tick(&tuning).unwrap();
        assert_eq!(e.velocity.x, 3.0);
        assert_eq!(e.velocity.y, 10.0);
    }

    #[test]
    fn non_finite_target_fails_tick_without_touching_velocity() {
        let tuning = SimTuning::default();
        let mut e = pawn_at(1, 10.0, 10.0);
        e.velocity = Vec3::xy(1.0, 1.0);
        e.pawn_mut()
            .unwrap()
            .set_target_velocity(Vec3::xy(f64::NAN, 0.0));
        assert!(e.tick(&tuning).is_err());
        assert_eq!(e.velocity, Vec3::xy(1.0, 1.0));
    }

    #[test]
    fn damage_clamps_at_zero_and_destroys() {
        let mut e = pawn_at(1, 0.0, 0.0);
        assert_eq!(e.apply_damage(50), Some(false));
        assert!(!e.is_destroyed());
        assert_eq!(e.apply_damage(70), Some(true));
        assert_eq!(e.pawn().unwrap().health(), 0);
        assert!(e.is_destroyed());
        assert_eq!(e.apply_damage(10), Some(true));
        assert!(e.is_destroyed());
    }

    #[test]
    fn walls_ignore_damage() {
        let mut wall = Entity::new(EntityId::from_parts(1, 2), Body::Wall, Vec3::ZERO, 1.0);
        assert_eq!(wall.apply_damage(50), None);
        assert!(!wall.is_destroyed());
    }

    #[test]
    fn shot_cooldown() {
        let cooldown = Duration::from_secs(3);
        let mut pawn = Pawn::default();
        let t0 = Instant::now();
        assert!(pawn.register_shot(t0, cooldown));
        assert!(!pawn.register_shot(t0 + Duration::from_secs(1), cooldown));
        assert!(pawn.register_shot(t0 + Duration::from_secs(3), cooldown));
    }

    #[test]
    fn wall_stops_other_party() {
        let tuning = SimTuning::default();
        let mut wall = Entity::new(EntityId::from_parts(1, 2), Body::Wall, Vec3::ZERO, 1.0);
        let mut pawn = pawn_at(1, 1.0, 0.0);
        pawn.velocity = Vec3::xy(-3.0, 2.0);
        wall.on_collision(&mut pawn, &tuning);
        assert_eq!(pawn.velocity, Vec3::ZERO);
    }

    #[test]
    fn boost_rewards_once() {
        let tuning = SimTuning::default();
        let mut boost = Entity::new(EntityId::from_parts(1, 3), Body::Boost, Vec3::ZERO, 1.0);
        let mut pawn = pawn_at(1, 0.5, 0.0);

        boost.on_collision(&mut pawn, &tuning);
        boost.on_collision(&mut pawn, &tuning);

        let p = pawn.pawn().unwrap();
        assert_eq!(p.score(), 30);
        assert_eq!(p.armor(), 50);
        assert!(boost.is_destroyed());
    }
}
