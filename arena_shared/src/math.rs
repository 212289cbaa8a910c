//! Math types.
//!
//! This module intentionally stays small. The arena is planar, so distance
//! helpers only look at the x/y plane while `z` is carried along untouched.

use serde::{Deserialize, Serialize};

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar vector (`z = 0`).
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Resets every component to zero in place.
    pub fn zero(&mut self) {
        *self = Self::ZERO;
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Euclidean distance in the x/y plane.
    pub fn distance_2d(self, rhs: Self) -> f64 {
        (self.x - rhs.x).hypot(self.y - rhs.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Unit direction in the x/y plane for an angle in radians.
    pub fn from_angle(angle: f64) -> Self {
        Self::xy(angle.cos(), angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resets_all_components() {
        let mut v = Vec3::new(1.0, -2.0, 3.5);
        v.zero();
        assert_eq!(v, Vec3::ZERO);
    }

    #[test]
    fn distance_ignores_z() {
        let a = Vec3::new(0.0, 0.0, 10.0);
        let b = Vec3::new(3.0, 4.0, -7.0);
        assert_eq!(a.distance_2d(b), 5.0);
    }

    #[test]
    fn angle_direction_is_unit_length() {
        let d = Vec3::from_angle(std::f64::consts::FRAC_PI_2);
        assert!(d.x.abs() < 1e-12);
        assert!((d.y - 1.0).abs() < 1e-12);
    }
}
