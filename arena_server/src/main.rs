//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p arena_server --bin server -- [--config server.json] [--addr 0.0.0.0:8080]
//!       [--walls 10] [--boosts 0] [--visualizer none|log]
//!
//! The server accepts clients for as long as it runs and plays sessions back
//! to back. Peers carry over between sessions and get a fresh pawn each time.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use arena_server::{
    registry::Server,
    session::run_session,
    visualizer::{LogVisualizer, NullVisualizer, Visualizer},
};
use arena_shared::config::{ServerConfig, VisualizerKind};
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<ServerConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ServerConfig::load(&args[i + 1])?,
        _ => ServerConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--walls" if i + 1 < args.len() => {
                cfg.walls = args[i + 1].parse().unwrap_or(cfg.walls);
                i += 2;
            }
            "--boosts" if i + 1 < args.len() => {
                cfg.boosts = args[i + 1].parse().unwrap_or(cfg.boosts);
                i += 2;
            }
            "--visualizer" if i + 1 < args.len() => {
                match args[i + 1].parse::<VisualizerKind>() {
                    Ok(kind) => cfg.visualizer = kind,
                    Err(e) => warn!(error = %e, "Ignoring --visualizer"),
                }
                i += 2;
            }
            "--config" if i + 1 < args.len() => i += 2,
            _ => i += 1,
        }
    }
    Ok(cfg)
}

fn make_visualizer(kind: VisualizerKind) -> Arc<dyn Visualizer> {
    match kind {
        VisualizerKind::None => Arc::new(NullVisualizer),
        VisualizerKind::Log => Arc::new(LogVisualizer),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(
        addr = %cfg.listen_addr,
        tick_hz = cfg.tick_hz,
        walls = cfg.walls,
        boosts = cfg.boosts,
        visualizer = ?cfg.visualizer,
        "Starting server"
    );

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("bad listen address {}", cfg.listen_addr))?;
    let server = Server::bind(addr, cfg.flush_interval())
        .await
        .context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    let registry = server.registry();
    let _accept = server.spawn_accept_loop();
    let visualizer = make_visualizer(cfg.visualizer);

    let mut session = 0u64;
    loop {
        session += 1;
        info!(session, "Starting new session");
        let summary = run_session(&cfg, Arc::clone(&registry), Arc::clone(&visualizer)).await?;
        info!(
            session,
            live_peers = registry.live_count(),
            summary = %serde_json::to_string(&summary)?,
            "Session over"
        );
    }
}
