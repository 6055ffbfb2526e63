//! Torpedoes and torpedo launchers.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::schema::shared::DamageType;
use crate::validate::{Validate, non_negative, positive};

/// A torpedo in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsTorpedo {
    pub launcher_id: Option<EntityId>,
    /// The ship that fired it, never a detonation target.
    pub ship_id: Option<EntityId>,
    pub damage_type: DamageType,
    pub damage: f64,
    /// Launch speed relative to the firing ship, km/s.
    pub speed: f64,
    /// km
    pub max_range: f64,
    /// km
    pub distance_traveled: f64,
    /// km
    pub detonation_radius: f64,
}

impl Default for IsTorpedo {
    fn default() -> Self {
        Self {
            launcher_id: None,
            ship_id: None,
            damage_type: DamageType::Explosive,
            damage: 10.0,
            speed: 50.0,
            max_range: 10_000.0,
            distance_traveled: 0.0,
            detonation_radius: 1.0,
        }
    }
}

impl Validate for IsTorpedo {
    fn validate(&self) -> Result<(), FieldError> {
        non_negative("damage", self.damage)?;
        non_negative("speed", self.speed)?;
        positive("maxRange", self.max_range)?;
        non_negative("distanceTraveled", self.distance_traveled)?;
        non_negative("detonationRadius", self.detonation_radius)
    }
}

/// `ready → loading → loaded → firing → ready` and `ready → unloading → ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LauncherStatus {
    #[default]
    Ready,
    Loading,
    Loaded,
    Firing,
    Unloading,
}

/// A torpedo launcher and its load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsTorpedoLauncher {
    pub status: LauncherStatus,
    /// ms
    pub load_time: f64,
    /// ms
    pub fire_time: f64,
    /// ms spent in the current timed state.
    pub progress: f64,
    pub torpedo_entity: Option<EntityId>,
}

impl Default for IsTorpedoLauncher {
    fn default() -> Self {
        Self {
            status: LauncherStatus::Ready,
            load_time: 5000.0,
            fire_time: 1000.0,
            progress: 0.0,
            torpedo_entity: None,
        }
    }
}

impl Validate for IsTorpedoLauncher {
    fn validate(&self) -> Result<(), FieldError> {
        positive("loadTime", self.load_time)?;
        positive("fireTime", self.fire_time)?;
        non_negative("progress", self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        let json = serde_json::to_value(LauncherStatus::Unloading).unwrap();
        assert_eq!(json, "unloading");
        let s: LauncherStatus = serde_json::from_value("loaded".into()).unwrap();
        assert_eq!(s, LauncherStatus::Loaded);
    }

    #[test]
    fn test_zero_load_time_rejected() {
        let l = IsTorpedoLauncher {
            load_time: 0.0,
            ..IsTorpedoLauncher::default()
        };
        assert!(l.validate().is_err());
    }
}
