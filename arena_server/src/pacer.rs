//! Fixed-timestep pacing.
//!
//! The world advances by exactly one frame per due poll. If the loop falls
//! behind, the missed frames are dropped rather than replayed. The async
//! cadences (executor frames, peer flushes) follow the same rule through
//! [`steady_interval`].

use std::time::{Duration, Instant};

use tokio::time::{Interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct FramePacer {
    frame: Duration,
    last: Instant,
}

impl FramePacer {
    pub fn new(frame: Duration, now: Instant) -> Self {
        Self { frame, last: now }
    }

    pub fn from_hz(hz: u32, now: Instant) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64), now)
    }

    /// Returns `None` if no frame is due yet. Otherwise returns how many
    /// additional elapsed frames were skipped; the caller runs one step.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let elapsed = now.saturating_duration_since(self.last);
        if elapsed < self.frame {
            return None;
        }
        let due = (elapsed.as_nanos() / self.frame.as_nanos().max(1)) as u32;
        self.last += self.frame * due;
        Some(due - 1)
    }
}

/// A tokio interval that never bursts to catch up after a stall.
pub fn steady_interval(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
