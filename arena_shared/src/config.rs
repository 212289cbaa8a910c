//! Configuration system.
//!
//! Loads server configuration from JSON strings/files. Every field has a
//! default so partial files are accepted.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Optional gameplay features advertised to clients.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArenaFeatures: u8 {
        const RADAR = 1 << 0;
        const AUTO_SHOOT = 1 << 1;
        const GRID_BASED = 1 << 2;
    }
}

/// Arena settings, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub size_x: f64,
    pub size_y: f64,
    pub max_players: u32,
    pub radar_enabled: bool,
    pub auto_shoot_allowed: bool,
    pub grid_based: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size_x: 100.0,
            size_y: 100.0,
            max_players: 32,
            radar_enabled: true,
            auto_shoot_allowed: false,
            grid_based: false,
        }
    }
}

impl ArenaConfig {
    pub fn features(&self) -> ArenaFeatures {
        let mut f = ArenaFeatures::empty();
        f.set(ArenaFeatures::RADAR, self.radar_enabled);
        f.set(ArenaFeatures::AUTO_SHOOT, self.auto_shoot_allowed);
        f.set(ArenaFeatures::GRID_BASED, self.grid_based);
        f
    }
}

/// Gameplay constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    /// Fraction of the remaining velocity gap closed per tick.
    pub easing_rate: f64,
    /// Per-axis velocity clamp for pawns.
    pub max_speed: [f64; 3],
    pub pawn_radius: f64,
    pub shot_cooldown_secs: f64,
    pub shot_damage: u8,
    pub ray_step: f64,
    pub ray_range: f64,
    pub hit_score: i64,
    pub kill_score: i64,
    pub boost_score: i64,
    pub boost_armor: u32,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            easing_rate: 0.5,
            max_speed: [10.0, 10.0, 10.0],
            pawn_radius: 1.0,
            shot_cooldown_secs: 3.0,
            shot_damage: 50,
            ray_step: 1.0,
            ray_range: 1000.0,
            hit_score: 20,
            kill_score: 50,
            boost_score: 30,
            boost_armor: 50,
        }
    }
}

impl SimTuning {
    /// Negative or NaN values mean no cooldown; infinity never allows a
    /// second shot.
    pub fn shot_cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.shot_cooldown_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure_non_negative("tuning.easing_rate", self.easing_rate)?;
        for (axis, max) in ["x", "y", "z"].iter().zip(self.max_speed) {
            anyhow::ensure!(
                max.is_finite() && max >= 0.0,
                "tuning.max_speed.{axis} must be finite and non-negative, got {max}"
            );
        }
        ensure_non_negative("tuning.pawn_radius", self.pawn_radius)?;
        ensure_non_negative("tuning.shot_cooldown_secs", self.shot_cooldown_secs)?;
        ensure_non_negative("tuning.ray_range", self.ray_range)?;
        anyhow::ensure!(
            self.ray_step.is_finite() && self.ray_step > 0.0,
            "tuning.ray_step must be finite and positive, got {}",
            self.ray_step
        );
        Ok(())
    }
}

fn ensure_non_negative(name: &str, value: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be finite and non-negative, got {value}"
    );
    Ok(())
}

/// Which visualizer the binary attaches to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisualizerKind {
    #[default]
    None,
    Log,
}

impl std::str::FromStr for VisualizerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(VisualizerKind::None),
            "log" => Ok(VisualizerKind::Log),
            other => anyhow::bail!("unknown visualizer type: {other}"),
        }
    }
}

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// World simulation rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Executor frame cadence.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Outbound queue flush cadence.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_walls")]
    pub walls: usize,
    #[serde(default = "default_wall_radius")]
    pub wall_radius: f64,
    #[serde(default)]
    pub boosts: usize,
    /// Optional hard limit per session; 0 disables it.
    #[serde(default)]
    pub session_time_limit_secs: u64,
    #[serde(default)]
    pub visualizer: VisualizerKind,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub tuning: SimTuning,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_tick_hz() -> u32 {
    60
}

fn default_frame_interval_ms() -> u64 {
    100
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_walls() -> usize {
    10
}

fn default_wall_radius() -> f64 {
    1.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            tick_hz: default_tick_hz(),
            frame_interval_ms: default_frame_interval_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            walls: default_walls(),
            wall_radius: default_wall_radius(),
            boosts: 0,
            session_time_limit_secs: 0,
            visualizer: VisualizerKind::None,
            arena: ArenaConfig::default(),
            tuning: SimTuning::default(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("load config {}", path.display()))
    }

    /// Parses and validates config from JSON.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let cfg = Self::from_json_str(s).context("parse config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure_non_negative("arena.size_x", self.arena.size_x)?;
        ensure_non_negative("arena.size_y", self.arena.size_y)?;
        ensure_non_negative("wall_radius", self.wall_radius)?;
        self.tuning.validate()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn session_time_limit(&self) -> Option<Duration> {
        (self.session_time_limit_secs > 0).then(|| Duration::from_secs(self.session_time_limit_secs))
    }
}
