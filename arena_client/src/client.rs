//! Client implementation.
//!
//! The server answers requests asynchronously, interleaved with the
//! `PlayerData` it pushes every frame, so replies are found by scanning the
//! inbound stream with [`ArenaClient::recv_until`]. Every message seen on
//! the way updates the cached state.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use arena_shared::{
    ids::EntityId,
    math::Vec3,
    net::{
        ClientMsg, FramedConn, PlayerData, RadarResult, ServerMsg, ShootRequest, ShootResult,
        WorldOptions,
    },
};
use tracing::{debug, info};

/// Client view of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Connected, no pawn yet.
    Waiting,
    /// `GameStarted` received.
    Playing,
    /// `GameEnded` received. A new session may start again.
    Ended,
}

pub struct ArenaClient {
    conn: FramedConn,
    state: ClientState,
    player: Option<PlayerData>,
}

impl ArenaClient {
    /// Connects and announces the client type.
    pub async fn connect(addr: SocketAddr, spectator: bool) -> anyhow::Result<Self> {
        info!(server = %addr, spectator, "Connecting to server");
        let mut conn = FramedConn::connect(addr).await?;
        conn.send(&ClientMsg::ClientInit { spectator })
            .await
            .context("send client init")?;
        Ok(Self {
            conn,
            state: ClientState::Waiting,
            player: None,
        })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Latest player data pushed by the server.
    pub fn player(&self) -> Option<&PlayerData> {
        self.player.as_ref()
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.player.as_ref().map(|p| p.id)
    }

    pub async fn send(&mut self, msg: &ClientMsg) -> anyhow::Result<()> {
        debug!(?msg, "Sending");
        self.conn.send(msg).await
    }

    /// Receives the next message and folds it into the cached state.
    pub async fn recv(&mut self) -> anyhow::Result<ServerMsg> {
        let msg: ServerMsg = self.conn.recv().await?;
        match &msg {
            ServerMsg::GameStarted => {
                info!("Game started");
                self.state = ClientState::Playing;
            }
            ServerMsg::PlayerData(data) => self.player = Some(data.clone()),
            ServerMsg::GameEnded { reason } => {
                info!(?reason, "Game ended");
                self.state = ClientState::Ended;
            }
            _ => {}
        }
        Ok(msg)
    }

    /// Reads messages until `pick` returns a value or `timeout` elapses.
    pub async fn recv_until<T>(
        &mut self,
        timeout: Duration,
        mut pick: impl FnMut(&ServerMsg) -> Option<T>,
    ) -> anyhow::Result<T> {
        let fut = async {
            loop {
                let msg = self.recv().await?;
                if let Some(v) = pick(&msg) {
                    return Ok::<T, anyhow::Error>(v);
                }
            }
        };
        tokio::time::timeout(timeout, fut)
            .await
            .context("timed out waiting for server message")?
    }

    /// Waits until the server has spawned a pawn for this client.
    pub async fn wait_for_spawn(&mut self, timeout: Duration) -> anyhow::Result<PlayerData> {
        self.recv_until(timeout, |m| match m {
            ServerMsg::PlayerData(d) => Some(d.clone()),
            _ => None,
        })
        .await
    }

    pub async fn world_info(&mut self, timeout: Duration) -> anyhow::Result<WorldOptions> {
        self.send(&ClientMsg::WorldInfoRequest).await?;
        self.recv_until(timeout, |m| match m {
            ServerMsg::WorldOptions(o) => Some(o.clone()),
            _ => None,
        })
        .await
    }

    pub async fn radar_ping(&mut self, timeout: Duration) -> anyhow::Result<RadarResult> {
        self.send(&ClientMsg::RadarPing).await?;
        self.recv_until(timeout, |m| match m {
            ServerMsg::RadarResult(r) => Some(r.clone()),
            _ => None,
        })
        .await
    }

    pub async fn set_speed(&mut self, speed: Vec3) -> anyhow::Result<()> {
        self.send(&ClientMsg::SetSpeed {
            x: speed.x,
            y: speed.y,
            z: speed.z,
        })
        .await
    }

    pub async fn shoot(
        &mut self,
        request: ShootRequest,
        timeout: Duration,
    ) -> anyhow::Result<ShootResult> {
        self.send(&ClientMsg::Shoot(request)).await?;
        self.recv_until(timeout, |m| match m {
            ServerMsg::ShootResult(r) => Some(r.clone()),
            _ => None,
        })
        .await
    }

    pub async fn shoot_angle(&mut self, angle: f64, timeout: Duration) -> anyhow::Result<ShootResult> {
        self.shoot(ShootRequest::Angle { angle }, timeout).await
    }

    pub async fn shoot_target(
        &mut self,
        target_id: EntityId,
        timeout: Duration,
    ) -> anyhow::Result<ShootResult> {
        self.shoot(ShootRequest::Target { target_id }, timeout).await
    }

    /// Waits for the end-of-game broadcast.
    pub async fn wait_for_end(&mut self, timeout: Duration) -> anyhow::Result<()> {
        self.recv_until(timeout, |m| {
            matches!(m, ServerMsg::GameEnded { .. }).then_some(())
        })
        .await
    }
}

/// Planar angle from `from` towards `to`, as used by angle shots.
pub fn aim_angle(from: Vec3, to: Vec3) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}
