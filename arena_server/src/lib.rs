//! `arena_server`
//!
//! Server-side systems:
//! - Fixed timestep world simulation with collisions and bounds
//! - Entity management in a slot store that is never compacted
//! - Per-connection reader/writer tasks over length-prefixed frames
//! - Executor that dispatches commands once per frame and detects game end
//!
//! Networking model:
//! - TCP only: one framed stream per client
//! - Outbound messages are queued and flushed on a fixed cadence

pub mod entity;
pub mod executor;
pub mod pacer;
pub mod peer;
pub mod registry;
pub mod session;
pub mod store;
pub mod visualizer;
pub mod world;

pub use executor::{Executor, FrameOutcome};
pub use registry::{PeerRegistry, Server};
pub use session::{run_session, SessionSummary};
pub use world::World;
