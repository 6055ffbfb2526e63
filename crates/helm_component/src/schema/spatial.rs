//! Position, velocity and orientation. Distances are km, speeds km/s.

use helm_math::{Coordinates, DQuat, DVec3, Orientation};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::validate::{Validate, ensure, finite};

/// The kind of frame a position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionFrame {
    #[default]
    Solar,
    Interstellar,
    Ship,
}

/// Location in km, relative to an optional parent frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// The entity whose frame this position is relative to (e.g. a solar system).
    pub parent_id: Option<EntityId>,
    #[serde(rename = "type")]
    pub frame: PositionFrame,
}

impl Position {
    /// A position with no parent.
    #[must_use]
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// The position as a coordinate triple.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.x, self.y, self.z)
    }

    /// Overwrite x, y and z, leaving the frame untouched.
    pub fn set_coordinates(&mut self, c: impl Into<Coordinates>) {
        let c = c.into();
        self.x = c.x;
        self.y = c.y;
        self.z = c.z;
    }

    /// Two positions are comparable only inside the same parent frame.
    #[must_use]
    pub fn same_frame(&self, other: &Position) -> bool {
        self.parent_id == other.parent_id && self.frame == other.frame
    }

    /// Distance to `other`, or `None` when the frames differ.
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> Option<f64> {
        self.same_frame(other)
            .then(|| self.coordinates().distance(&other.coordinates()))
    }
}

impl Validate for Position {
    fn validate(&self) -> Result<(), FieldError> {
        finite("x", self.x)?;
        finite("y", self.y)?;
        finite("z", self.z)
    }
}

/// Linear velocity in km/s.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    /// The velocity as a vector.
    #[must_use]
    pub fn vector(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    /// Build from a vector.
    #[must_use]
    pub fn from_vector(v: DVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl Validate for Velocity {
    fn validate(&self) -> Result<(), FieldError> {
        finite("x", self.x)?;
        finite("y", self.y)?;
        finite("z", self.z)
    }
}

/// Orientation as a unit quaternion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Rotation {
    /// The orientation as a math type.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        Orientation {
            x: self.x,
            y: self.y,
            z: self.z,
            w: self.w,
        }
    }

    /// The orientation as a `DQuat`.
    #[must_use]
    pub fn quat(&self) -> DQuat {
        self.orientation().into()
    }

    /// Build from a quaternion.
    #[must_use]
    pub fn from_quat(q: DQuat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::from_quat(DQuat::IDENTITY)
    }
}

impl Validate for Rotation {
    fn validate(&self) -> Result<(), FieldError> {
        ensure(
            self.orientation().is_valid(),
            "w",
            "quaternion must be finite and non-zero",
        )
    }
}

/// Angular velocity in radians per second around each axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationVelocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Validate for RotationVelocity {
    fn validate(&self) -> Result<(), FieldError> {
        finite("x", self.x)?;
        finite("y", self.y)?;
        finite("z", self.z)
    }
}
