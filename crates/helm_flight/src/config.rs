//! Flight and tick configuration.

use std::time::Duration;

use helm_physics::BackendKind;
use serde::{Deserialize, Serialize};

use crate::error::FlightError;

/// How elapsed time is fed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TickMode {
    /// Every tick advances exactly one tick period, however late it runs.
    #[default]
    Fixed,
    /// Every tick advances by the wall time since the previous one.
    Variable,
}

/// Configuration for a flight's tick driver.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    pub mode: TickMode,
    /// Upper bound on the wall-clock delta a variable-rate tick may
    /// advance. Never below one period.
    pub max_elapsed: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            mode: TickMode::Fixed,
            max_elapsed: Duration::from_millis(250),
        }
    }
}

impl TickConfig {
    /// Every tick advances by exactly one period. `max_elapsed` is raised
    /// to the period for rates below 4 Hz.
    #[must_use]
    pub fn fixed(tick_rate: f64) -> Self {
        let mut tick = Self {
            tick_rate,
            ..Self::default()
        };
        tick.max_elapsed = tick.max_elapsed.max(tick.tick_duration());
        tick
    }

    /// Every tick advances by the measured wall-clock delta, capped at
    /// `max_elapsed`.
    #[must_use]
    pub fn variable(tick_rate: f64) -> Self {
        Self {
            mode: TickMode::Variable,
            ..Self::fixed(tick_rate)
        }
    }

    /// Stop after this many ticks; zero runs forever.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Cap on the wall-clock delta of a variable-rate tick.
    #[must_use]
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// The wall-clock period between ticks. Zero when the rate is not a
    /// positive finite number.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.tick_rate).unwrap_or(Duration::ZERO)
    }

    /// Bound a variable-rate wall-clock delta by `max_elapsed`.
    #[must_use]
    pub fn clamp(&self, elapsed: Duration) -> Duration {
        elapsed.min(self.max_elapsed)
    }

    /// Reject rates and caps that cannot be scheduled.
    pub fn validate(&self) -> Result<(), FlightError> {
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            return Err(FlightError::Config(format!(
                "tick rate must be a positive number, got {}",
                self.tick_rate
            )));
        }
        let period = self.tick_duration();
        if period.is_zero() {
            return Err(FlightError::Config(format!(
                "tick rate {} is too high to schedule",
                self.tick_rate
            )));
        }
        if self.max_elapsed < period {
            return Err(FlightError::Config(format!(
                "max elapsed ({} ms) is shorter than one tick period ({} ms)",
                self.max_elapsed.as_millis(),
                period.as_millis()
            )));
        }
        Ok(())
    }
}

/// Everything needed to start a flight.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightConfig {
    pub name: String,
    pub tick: TickConfig,
    pub physics: BackendKind,
    /// Change sets buffered between the tick driver and the notification
    /// dispatcher before the driver waits.
    pub channel_capacity: usize,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            name: "flight".to_string(),
            tick: TickConfig::default(),
            physics: BackendKind::default(),
            channel_capacity: 64,
        }
    }
}

impl FlightConfig {
    /// Defaults: 60 Hz fixed ticks on the rapier backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown in logs and status replies.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the tick settings.
    #[must_use]
    pub fn with_tick(mut self, tick: TickConfig) -> Self {
        self.tick = tick;
        self
    }

    /// Choose the physics backend.
    #[must_use]
    pub fn with_physics(mut self, physics: BackendKind) -> Self {
        self.physics = physics;
        self
    }

    /// Depth of the driver's command queue.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}
