//! Waypoints and the autopilot that steers toward them.

use helm_math::Coordinates;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::validate::{Validate, ensure};

/// A navigation marker, removed once its assigned ship arrives.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsWaypoint {
    pub assigned_ship_id: Option<EntityId>,
}

impl Validate for IsWaypoint {
    fn validate(&self) -> Result<(), FieldError> {
        Ok(())
    }
}

/// Steering state for a ship flying itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Autopilot {
    pub desired_coordinates: Option<Coordinates>,
    pub desired_solar_system_id: Option<EntityId>,
    pub destination_waypoint_id: Option<EntityId>,
    pub rotation_autopilot: bool,
    pub forward_autopilot: bool,
}

impl Validate for Autopilot {
    fn validate(&self) -> Result<(), FieldError> {
        ensure(
            self.desired_coordinates.is_none_or(|c| c.is_finite()),
            "desiredCoordinates",
            "must be finite",
        )
    }
}
