//! Physics handle tables.
//!
//! A physics-world entity lists the bodies it owns; each body entity lists
//! the worlds it is registered in. Handles are the backend's native body
//! handle packed into a `u64`. Both sides are plain id maps with no ownership.

use std::collections::BTreeMap;

use helm_math::Coordinates;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::validate::{Validate, finite, positive};

/// A physics world: the bodies registered in its native engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsWorld {
    /// body entity -> native handle
    pub bodies: BTreeMap<EntityId, u64>,
    /// km/s²
    pub gravity: Coordinates,
}

impl Validate for PhysicsWorld {
    fn validate(&self) -> Result<(), FieldError> {
        finite("gravity.x", self.gravity.x)?;
        finite("gravity.y", self.gravity.y)?;
        finite("gravity.z", self.gravity.z)
    }
}

/// A physics body and the worlds it is registered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsHandles {
    /// world entity -> native handle
    pub handles: BTreeMap<EntityId, u64>,
    /// Collision radius in km.
    pub radius: f64,
    /// Body mass in kilograms.
    pub mass: f64,
}

impl PhysicsHandles {
    /// Registered in at least one physics world.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.handles.is_empty()
    }
}

impl Default for PhysicsHandles {
    fn default() -> Self {
        Self {
            handles: BTreeMap::new(),
            radius: 0.1,
            mass: 1000.0,
        }
    }
}

impl Validate for PhysicsHandles {
    fn validate(&self) -> Result<(), FieldError> {
        positive("radius", self.radius)?;
        positive("mass", self.mass)
    }
}
