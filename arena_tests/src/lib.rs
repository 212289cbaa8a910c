//! Helpers shared by the socket-level integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arena_server::{
    registry::{PeerRegistry, Server},
    session::{run_session, SessionSummary},
    visualizer::{ChannelVisualizer, Visualizer},
};
use arena_shared::config::ServerConfig;
use tokio::task::JoinHandle;

/// Config with fast cadences and an empty arena apart from the wall ring.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        frame_interval_ms: 20,
        flush_interval_ms: 10,
        walls: 0,
        boosts: 0,
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server running one session in the background.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<PeerRegistry>,
    pub visualizer: Arc<ChannelVisualizer>,
    accept: JoinHandle<()>,
    session: JoinHandle<anyhow::Result<SessionSummary>>,
}

impl TestServer {
    /// Binds an ephemeral port and starts accepting plus a single session.
    pub async fn start(cfg: ServerConfig) -> anyhow::Result<Self> {
        let server = Server::bind(cfg.listen_addr.parse()?, cfg.flush_interval()).await?;
        let addr = server.local_addr()?;
        let registry = server.registry();
        let accept = server.spawn_accept_loop();

        let visualizer = Arc::new(ChannelVisualizer::new(64));
        let session_registry = Arc::clone(&registry);
        let session_vis: Arc<dyn Visualizer> = visualizer.clone();
        let session =
            tokio::spawn(async move { run_session(&cfg, session_registry, session_vis).await });

        Ok(Self {
            addr,
            registry,
            visualizer,
            accept,
            session,
        })
    }

    /// Waits for the session to finish.
    pub async fn finish(mut self, timeout: Duration) -> anyhow::Result<SessionSummary> {
        let summary = tokio::time::timeout(timeout, &mut self.session).await???;
        Ok(summary)
    }

    /// Polls until `n` peers are registered.
    pub async fn wait_for_peers(&self, n: usize, timeout: Duration) -> anyhow::Result<()> {
        tokio::time::timeout(timeout, async {
            while self.registry.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept.abort();
        self.session.abort();
    }
}
