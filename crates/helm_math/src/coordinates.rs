//! Serialisable vector and orientation shapes.
//!
//! Components store plain `{x, y, z}` objects so that payloads crossing the
//! external boundary keep a stable JSON shape. Maths happens on the glam
//! types via the `From` conversions.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// A point or direction in kilometres (or km/s when used as a velocity).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    /// The origin.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new coordinate triple.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns `true` if every axis is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Coordinates) -> f64 {
        DVec3::from(*self).distance(DVec3::from(*other))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(&self) -> f64 {
        DVec3::from(*self).length()
    }
}

impl From<Coordinates> for DVec3 {
    fn from(c: Coordinates) -> Self {
        DVec3::new(c.x, c.y, c.z)
    }
}

impl From<DVec3> for Coordinates {
    fn from(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// A unit quaternion orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Orientation {
    /// No rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Returns `true` if the quaternion can be normalised.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let q = DQuat::from(*self);
        q.is_finite() && q.length_squared() > f64::EPSILON
    }

    /// The direction the entity faces. Forward is +Z in the local frame.
    #[must_use]
    pub fn forward(&self) -> DVec3 {
        DQuat::from(*self).normalize() * DVec3::Z
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Orientation> for DQuat {
    fn from(o: Orientation) -> Self {
        DQuat::from_xyzw(o.x, o.y, o.z, o.w)
    }
}

impl From<DQuat> for Orientation {
    fn from(q: DQuat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}
