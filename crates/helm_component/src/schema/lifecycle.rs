//! Timed destruction.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::validate::{Validate, non_negative};

/// Schedules removal of the entity once `timer` reaches `timeToDestroy`.
/// Both values are milliseconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsDestroyed {
    pub time_to_destroy: f64,
    pub timer: f64,
    /// Explosion effect name, for clients.
    pub explosion: Option<String>,
}

impl IsDestroyed {
    /// A countdown of `ms` milliseconds.
    #[must_use]
    pub fn after_millis(ms: f64) -> Self {
        Self {
            time_to_destroy: ms,
            ..Self::default()
        }
    }

    /// Has the countdown run out?
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.timer >= self.time_to_destroy
    }
}

impl Validate for IsDestroyed {
    fn validate(&self) -> Result<(), FieldError> {
        non_negative("timeToDestroy", self.time_to_destroy)?;
        non_negative("timer", self.timer)
    }
}
