//! Wire protocol.
//!
//! Every frame is a 4-byte little-endian length followed by exactly that many
//! payload bytes. Payloads are `serde_json` encodings of [`ClientMsg`] and
//! [`ServerMsg`]; the framing does not care what is inside.

use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

use crate::{ids::EntityId, math::Vec3};

/// Largest accepted payload. Anything bigger is treated as a malformed frame.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Client -> server messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMsg {
    /// Declares the connection type. Not queued for the executor.
    ClientInit { spectator: bool },
    WorldInfoRequest,
    /// Desired velocity; the pawn eases towards it.
    SetSpeed { x: f64, y: f64, z: f64 },
    RadarPing,
    Shoot(ShootRequest),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ShootRequest {
    /// Direct hit on a known entity id.
    Target { target_id: EntityId },
    /// Ray cast from the shooter along an angle in radians.
    Angle { angle: f64 },
}

/// Server -> client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMsg {
    GameStarted,
    PlayerData(PlayerData),
    WorldOptions(WorldOptions),
    RadarResult(RadarResult),
    ShootResult(ShootResult),
    GameEnded { reason: GameEndedReason },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerData {
    pub id: EntityId,
    pub position: Vec3,
    pub speed: Vec3,
    pub armor: u32,
    pub health: u8,
    pub score: i64,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldOptions {
    pub map_x: f64,
    pub map_y: f64,
    pub auto_shoot_allowed: bool,
    pub grid_based: bool,
    pub max_players: u32,
    pub radar_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadarReturnType {
    Player,
    Boost,
    Wall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadarReturn {
    pub id: EntityId,
    pub position: Vec3,
    pub speed: Vec3,
    pub return_type: RadarReturnType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RadarResult {
    pub returns: Vec<RadarReturn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShootFailReason {
    Cooldown,
    Miss,
    /// Targeted shot at an id that is not an active pawn.
    InvalidTarget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShootResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<u8>,
    #[serde(default)]
    pub target_destroyed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<ShootFailReason>,
}

impl ShootResult {
    pub fn failed(reason: ShootFailReason) -> Self {
        Self {
            success: false,
            fail_reason: Some(reason),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEndedReason {
    GameStopped,
}

/// Appends one length-prefixed frame to `buf`.
pub fn encode_frame<T: Serialize>(msg: &T, buf: &mut BytesMut) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    anyhow::ensure!(
        payload.len() <= MAX_FRAME_LEN,
        "frame too large: {} bytes",
        payload.len()
    );
    buf.reserve(4 + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(())
}

/// Reads exactly one frame and decodes its payload.
pub async fn read_frame<R, T>(reader: &mut R) -> anyhow::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_le_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len} bytes");
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    decode_from_bytes(&payload)
}

/// Encodes and writes one frame.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = BytesMut::new();
    encode_frame(msg, &mut buf)?;
    writer.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

/// TCP stream speaking the framed protocol.
#[derive(Debug)]
pub struct FramedConn {
    stream: TcpStream,
}

impl FramedConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        read_frame(&mut self.stream).await
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes<T: Serialize>(msg: &T) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes<T: DeserializeOwned>(b: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(b).context("deserialize")
}
