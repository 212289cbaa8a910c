//! Connection acceptance and the live peer set.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{info, warn};

use crate::peer::{spawn_io, Peer};

/// Every peer accepted so far, dead or alive, in connection order.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<Vec<Arc<Peer>>>,
}

impl PeerRegistry {
    pub fn add(&self, peer: Arc<Peer>) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
    }

    /// Snapshot of the current peer set.
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| !p.is_dead())
            .count()
    }
}

/// TCP front door.
pub struct Server {
    listener: TcpListener,
    registry: Arc<PeerRegistry>,
    flush_interval: Duration,
}

impl Server {
    /// Binds the listening socket. This is the only fatal failure.
    pub async fn bind(addr: SocketAddr, flush_interval: Duration) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self {
            listener,
            registry: Arc::new(PeerRegistry::default()),
            flush_interval,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts one connection and starts its I/O tasks.
    pub async fn accept_one(&self) -> anyhow::Result<Arc<Peer>> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%addr, error = %e, "Could not set TCP_NODELAY");
        }
        let (peer, io) = Peer::new(Some(addr));
        self.registry.add(Arc::clone(&peer));
        spawn_io(Arc::clone(&peer), io, stream, self.flush_interval);
        info!(peer = %peer.id(), %addr, "New client connected");
        Ok(peer)
    }

    /// Accepts connections until the listener fails.
    pub fn spawn_accept_loop(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.accept_one().await {
                    warn!(error = %format!("{e:#}"), "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::net::{ClientMsg, FramedConn};

    #[test]
    fn dead_peers_stay_registered() {
        let registry = PeerRegistry::default();
        let (a, _io_a) = Peer::new(None);
        let (b, _io_b) = Peer::new(None);
        registry.add(Arc::clone(&a));
        registry.add(b);
        a.mark_dead();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn accepted_connections_are_registered() -> anyhow::Result<()> {
        let server = Server::bind("127.0.0.1:0".parse()?, Duration::from_millis(10)).await?;
        let addr = server.local_addr()?;
        let registry = server.registry();
        let accept = tokio::spawn(async move { server.accept_one().await });

        let mut conn = FramedConn::connect(addr).await?;
        conn.send(&ClientMsg::RadarPing).await?;

        let peer = accept.await??;
        assert_eq!(registry.len(), 1);
        assert!(peer.is_player());
        assert_eq!(peer.addr().map(|a| a.ip()), Some(addr.ip()));

        let mut got = None;
        for _ in 0..100 {
            got = peer.pop_message();
            if got.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(got, Some(ClientMsg::RadarPing));
        Ok(())
    }
}
