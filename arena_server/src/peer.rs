//! Per-connection session state and I/O tasks.
//!
//! A [`Peer`] is the executor's view of a connection: its kind, a dead flag
//! and two queues. The socket itself is owned by two tasks:
//! - the reader parses frames and feeds the inbound queue;
//! - the writer drains the outbound queue on every flush tick.
//!
//! Any I/O or parse failure marks the peer dead. Dead peers stay registered.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;

use anyhow::Context;
use arena_shared::{
    ids::PeerId,
    net::{encode_frame, read_frame, ClientMsg, ServerMsg},
};
use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::pacer::steady_interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PeerKind {
    Player = 0,
    Spectator = 1,
}

impl PeerKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PeerKind::Player),
            1 => Some(PeerKind::Spectator),
            _ => None,
        }
    }
}

pub struct Peer {
    id: PeerId,
    addr: Option<SocketAddr>,
    kind: AtomicU8,
    dead: AtomicBool,
    inbound: Mutex<mpsc::UnboundedReceiver<ClientMsg>>,
    outbound: mpsc::UnboundedSender<ServerMsg>,
}

/// The socket-facing ends of a peer's queues.
pub struct PeerIo {
    pub inbound: mpsc::UnboundedSender<ClientMsg>,
    pub outbound: mpsc::UnboundedReceiver<ServerMsg>,
}

impl Peer {
    pub fn new(addr: Option<SocketAddr>) -> (Arc<Self>, PeerIo) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Self {
            id: PeerId::new_unique(),
            addr,
            kind: AtomicU8::new(PeerKind::Player as u8),
            dead: AtomicBool::new(false),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
        });
        let io = PeerIo {
            inbound: in_tx,
            outbound: out_rx,
        };
        (peer, io)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn kind(&self) -> PeerKind {
        PeerKind::from_u8(self.kind.load(Ordering::Acquire)).unwrap_or(PeerKind::Player)
    }

    pub fn set_kind(&self, kind: PeerKind) {
        self.kind.store(kind as u8, Ordering::Release);
    }

    pub fn is_player(&self) -> bool {
        self.kind() == PeerKind::Player
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub fn mark_dead(&self) {
        if !self.dead.swap(true, Ordering::AcqRel) {
            info!(peer = %self.id, addr = ?self.addr, "Peer marked dead");
        }
    }

    /// Queues a message for the next flush.
    pub fn queue_message(&self, msg: ServerMsg) -> anyhow::Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| anyhow::anyhow!("outbound queue closed for {}", self.id))
    }

    /// Pops the oldest parsed inbound message, if any.
    pub fn pop_message(&self) -> Option<ClientMsg> {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }
}

/// Spawns the reader and writer tasks for a connected stream.
pub fn spawn_io<S>(
    peer: Arc<Peer>,
    io: PeerIo,
    stream: S,
    flush_interval: Duration,
) -> (JoinHandle<()>, JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);

    let reader_peer = Arc::clone(&peer);
    let inbound = io.inbound;
    let read_task = tokio::spawn(async move {
        if let Err(e) = read_loop(&reader_peer, inbound, reader).await {
            warn!(peer = %reader_peer.id(), error = %format!("{e:#}"), "Peer read failed");
        }
        reader_peer.mark_dead();
    });

    let outbound = io.outbound;
    let write_task = tokio::spawn(async move {
        if let Err(e) = write_loop(&peer, outbound, writer, flush_interval).await {
            warn!(peer = %peer.id(), error = %format!("{e:#}"), "Peer write failed");
            peer.mark_dead();
        }
    });

    (read_task, write_task)
}

async fn read_loop<R>(
    peer: &Peer,
    inbound: mpsc::UnboundedSender<ClientMsg>,
    mut reader: R,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let msg: ClientMsg = read_frame(&mut reader).await?;
        match msg {
            ClientMsg::ClientInit { spectator } => {
                let kind = if spectator {
                    PeerKind::Spectator
                } else {
                    PeerKind::Player
                };
                peer.set_kind(kind);
                info!(peer = %peer.id(), ?kind, "Client init");
            }
            other => {
                debug!(peer = %peer.id(), msg = ?other, "Inbound message");
                inbound.send(other).context("inbound queue closed")?;
            }
        }
    }
}

async fn write_loop<W>(
    peer: &Peer,
    mut outbound: mpsc::UnboundedReceiver<ServerMsg>,
    mut writer: W,
    flush_interval: Duration,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = steady_interval(flush_interval);
    let mut buf = BytesMut::new();
    loop {
        ticker.tick().await;
        if peer.is_dead() {
            return Ok(());
        }

        let mut closed = false;
        loop {
            match outbound.try_recv() {
                Ok(msg) => encode_frame(&msg, &mut buf)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        if !buf.is_empty() {
            writer.write_all(&buf).await.context("tcp write")?;
            writer.flush().await.context("tcp flush")?;
            buf.clear();
        }
        if closed {
            return Ok(());
        }
    }
}
