//! The seam between the bridge and a native rigid-body engine.
//!
//! One [`PhysicsBackend`] instance is one native world. Lengths crossing
//! this boundary are already in physics units (see
//! [`helm_math::units`]); the bridge does the conversion.

use std::fmt;
use std::str::FromStr;

use helm_math::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::point_mass::PointMassBackend;
use crate::rapier::RapierBackend;

/// A native body handle packed into a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyHandle(pub u64);

/// What the bridge asks a backend to create.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub position: DVec3,
    pub velocity: DVec3,
    pub radius: f64,
    pub mass: f64,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            velocity: DVec3::ZERO,
            radius: 0.1,
            mass: 1000.0,
        }
    }
}

/// Kinematic state read back after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: DVec3,
    pub velocity: DVec3,
}

/// A native physics engine holding the bodies of one world.
pub trait PhysicsBackend: Send {
    fn name(&self) -> &'static str;

    fn set_gravity(&mut self, gravity: DVec3);

    fn insert_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Returns `false` if the handle did not resolve.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    fn contains_body(&self, handle: BodyHandle) -> bool;

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState>;

    fn set_body_state(&mut self, handle: BodyHandle, state: &BodyState) -> bool;

    /// Accumulate a force (kg·km/s²) applied during the next step only.
    fn apply_force(&mut self, handle: BodyHandle, force: DVec3) -> bool;

    /// Advance by `dt` seconds. Accumulated forces are cleared afterwards.
    fn step(&mut self, dt: f64);

    fn body_count(&self) -> usize;
}

/// Which native engine a flight uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Rapier,
    PointMass,
}

impl BackendKind {
    /// An empty engine of this kind.
    pub fn create(self) -> Box<dyn PhysicsBackend> {
        match self {
            BackendKind::Rapier => Box::new(RapierBackend::new()),
            BackendKind::PointMass => Box::new(PointMassBackend::new()),
        }
    }

    /// The name used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Rapier => "rapier",
            BackendKind::PointMass => "point-mass",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = PhysicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rapier" => Ok(BackendKind::Rapier),
            "point-mass" | "point_mass" => Ok(BackendKind::PointMass),
            other => Err(PhysicsError::UnknownBackend(other.to_string())),
        }
    }
}
