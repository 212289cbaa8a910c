//! `arena_client`
//!
//! Client-side systems:
//! - Framed TCP connection to an arena server
//! - Typed request helpers for every command the server understands
//! - Tracking of the latest player data and game state

pub mod client;

pub use client::{aim_angle, ArenaClient, ClientState};
