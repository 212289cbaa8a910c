//! One game session: a fresh world, its tick loop and an executor run.

use std::sync::Arc;

use anyhow::Context;
use arena_shared::{config::ServerConfig, ids::EntityId};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::{executor::Executor, registry::PeerRegistry, visualizer::Visualizer, world::World};

/// What happened in a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub winner: Option<EntityId>,
    pub frames: u64,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Populates a world with the configured obstacles and pickups.
pub fn populate_world(world: &World, cfg: &ServerConfig, rng: &mut StdRng) {
    world.generate_random_walls(cfg.walls, cfg.wall_radius, rng);
    world.generate_wall_bounds();
    world.generate_random_boosts(cfg.boosts, rng);
    info!(entities = world.len(), walls = cfg.walls, boosts = cfg.boosts, "World populated");
}

/// Runs a session to completion against the peers in `registry`.
pub async fn run_session(
    cfg: &ServerConfig,
    registry: Arc<PeerRegistry>,
    visualizer: Arc<dyn Visualizer>,
) -> anyhow::Result<SessionSummary> {
    let started_at = Utc::now();
    let mut rng = StdRng::from_entropy();

    let world = Arc::new(World::from_config(cfg));
    let handle = world.start();
    populate_world(&world, cfg, &mut rng);

    let mut executor = Executor::new(registry, Arc::clone(&world), visualizer, cfg.frame_interval())
        .with_rng(rng);
    let result = match cfg.session_time_limit() {
        Some(limit) => executor.run_for(limit).await,
        None => executor.run().await,
    };

    handle.stop().await.context("stop world")?;
    let summary = SessionSummary {
        winner: result.winner,
        frames: result.frames,
        timed_out: result.timed_out,
        started_at,
        ended_at: Utc::now(),
    };
    info!(
        winner = ?summary.winner,
        frames = summary.frames,
        timed_out = summary.timed_out,
        millis = summary.duration().num_milliseconds(),
        "Session finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::peer::Peer;
    use crate::visualizer::NullVisualizer;
    use arena_shared::config::ArenaConfig;

    fn small_config() -> ServerConfig {
        ServerConfig {
            walls: 4,
            boosts: 2,
            frame_interval_ms: 10,
            session_time_limit_secs: 1,
            arena: ArenaConfig {
                size_x: 20.0,
                size_y: 20.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn populate_adds_walls_ring_and_boosts() {
        let cfg = small_config();
        let world = World::from_config(&cfg);
        populate_world(&world, &cfg, &mut StdRng::seed_from_u64(5));

        let snaps = world.snapshot();
        let walls = snaps.iter().filter(|s| s.kind == EntityKind::Wall).count();
        let boosts = snaps.iter().filter(|s| s.kind == EntityKind::Boost).count();
        assert_eq!(walls, 4 + 2 * 20 + 2 * 20);
        assert_eq!(boosts, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn time_limited_session_ends() -> anyhow::Result<()> {
        let registry = Arc::new(PeerRegistry::default());
        let (peer, mut io) = Peer::new(None);
        registry.add(peer);

        let summary = run_session(&small_config(), registry, Arc::new(NullVisualizer)).await?;
        assert!(summary.timed_out);
        assert_eq!(summary.winner, None);
        assert!(summary.frames > 0);
        assert!(summary.ended_at >= summary.started_at);
        let json = serde_json::to_value(&summary)?;
        assert_eq!(json["timed_out"], true);

        let mut saw_end = false;
        while let Ok(msg) = io.outbound.try_recv() {
            saw_end |= matches!(msg, arena_shared::net::ServerMsg::GameEnded { .. });
        }
        assert!(saw_end);
        Ok(())
    }
}
