//! Visualizer boundary.
//!
//! This crate does not render anything. A visualizer only receives shot
//! notifications from the executor and may poll `World::snapshot()` on its
//! own schedule. Implementations must return immediately.

use arena_shared::math::Vec3;
use tokio::sync::broadcast;
use tracing::info;

/// A resolved shot, from shooter to hit entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotTrace {
    pub start: Vec3,
    pub end: Vec3,
}

pub trait Visualizer: Send + Sync {
    fn draw_shot(&self, start: Vec3, end: Vec3);
}

/// Discards everything. Useful for headless runs and tests.
#[derive(Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn draw_shot(&self, _start: Vec3, _end: Vec3) {}
}

/// Writes shots to the log.
#[derive(Debug, Default)]
pub struct LogVisualizer;

impl Visualizer for LogVisualizer {
    fn draw_shot(&self, start: Vec3, end: Vec3) {
        info!(
            from_x = start.x,
            from_y = start.y,
            to_x = end.x,
            to_y = end.y,
            "Shot"
        );
    }
}

/// Fans shots out to any number of subscribers. Lagging subscribers lose
/// old traces; the sender never waits.
#[derive(Debug)]
pub struct ChannelVisualizer {
    tx: broadcast::Sender<ShotTrace>,
}

impl ChannelVisualizer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShotTrace> {
        self.tx.subscribe()
    }
}

impl Visualizer for ChannelVisualizer {
    fn draw_shot(&self, start: Vec3, end: Vec3) {
        // No subscribers is fine.
        let _ = self.tx.send(ShotTrace { start, end });
    }
}
