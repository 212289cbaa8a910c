//! `arena_shared`
//!
//! Libraries used by both the arena server and its clients.
//!
//! Design goals:
//! - One definition of the wire protocol and its framing.
//! - Plain data types (math, ids, config) with no runtime state.
//! - No `unsafe`.

pub mod config;
pub mod ids;
pub mod math;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::ids::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
