//! Ships, ship systems and their durability.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::validate::{Validate, ensure, non_negative, positive};

/// Display name and free-form description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Identity {
    pub name: String,
    pub description: String,
}

impl Validate for Identity {
    fn validate(&self) -> Result<(), FieldError> {
        ensure(
            self.name.chars().count() <= 128,
            "name",
            "must be at most 128 characters",
        )
    }
}

/// Free-form labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tags {
    pub tags: Vec<String>,
}

impl Validate for Tags {
    fn validate(&self) -> Result<(), FieldError> {
        ensure(
            self.tags.iter().all(|t| !t.trim().is_empty()),
            "tags",
            "tags must not be empty",
        )
    }
}

/// Marks an entity as a ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsShip {
    pub category: String,
    /// Mass in kilograms.
    pub mass: f64,
}

impl Default for IsShip {
    fn default() -> Self {
        Self {
            category: "Cruiser".to_string(),
            mass: 2.0e6,
        }
    }
}

impl Validate for IsShip {
    fn validate(&self) -> Result<(), FieldError> {
        positive("mass", self.mass)
    }
}

/// Marks an entity as a system installed on a ship.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsShipSystem {
    pub ship_id: Option<EntityId>,
    #[serde(rename = "type")]
    pub system_type: String,
}

impl Validate for IsShipSystem {
    fn validate(&self) -> Result<(), FieldError> {
        Ok(())
    }
}

/// Thrust settings for a ship's sublight drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsImpulseEngines {
    /// km/s
    pub cruising_speed: f64,
    /// km/s
    pub emergency_speed: f64,
    /// km/s, set by the helm.
    pub target_speed: f64,
}

impl Default for IsImpulseEngines {
    fn default() -> Self {
        Self {
            cruising_speed: 1500.0,
            emergency_speed: 2000.0,
            target_speed: 0.0,
        }
    }
}

impl Validate for IsImpulseEngines {
    fn validate(&self) -> Result<(), FieldError> {
        non_negative("cruisingSpeed", self.cruising_speed)?;
        non_negative("emergencySpeed", self.emergency_speed)?;
        non_negative("targetSpeed", self.target_speed)?;
        ensure(
            self.cruising_speed <= self.emergency_speed,
            "cruisingSpeed",
            "must not exceed emergencySpeed",
        )
    }
}

/// Structural integrity; breached at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hull {
    pub value: f64,
    pub max: f64,
}

impl Hull {
    /// Has the hull failed?
    #[must_use]
    pub fn is_breached(&self) -> bool {
        self.value <= 0.0
    }
}

impl Default for Hull {
    fn default() -> Self {
        Self {
            value: 100.0,
            max: 100.0,
        }
    }
}

impl Validate for Hull {
    fn validate(&self) -> Result<(), FieldError> {
        positive("max", self.max)?;
        non_negative("value", self.value)?;
        ensure(self.value <= self.max, "value", "must not exceed max")
    }
}

/// Whether the shields are raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShieldState {
    Up,
    #[default]
    Down,
}

/// Shield strength and state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Shields {
    pub state: ShieldState,
    pub strength: f64,
    pub max_strength: f64,
    /// Modulation frequency in MHz.
    pub frequency: f64,
}

impl Shields {
    /// Absorb as much of `damage` as the shields can hold. Returns the
    /// remainder that gets through to the hull.
    pub fn absorb(&mut self, damage: f64) -> f64 {
        if self.state == ShieldState::Down {
            return damage;
        }
        let absorbed = damage.min(self.strength);
        self.strength -= absorbed;
        if self.strength <= 0.0 {
            self.strength = 0.0;
            self.state = ShieldState::Down;
        }
        damage - absorbed
    }
}

impl Default for Shields {
    fn default() -> Self {
        Self {
            state: ShieldState::Down,
            strength: 5.0,
            max_strength: 5.0,
            frequency: 150.0,
        }
    }
}

impl Validate for Shields {
    fn validate(&self) -> Result<(), FieldError> {
        non_negative("maxStrength", self.max_strength)?;
        non_negative("strength", self.strength)?;
        ensure(
            self.strength <= self.max_strength,
            "strength",
            "must not exceed maxStrength",
        )?;
        non_negative("frequency", self.frequency)
    }
}
