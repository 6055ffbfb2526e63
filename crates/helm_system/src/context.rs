//! Per-tick execution context handed to every system update.

use std::time::Duration;

use helm_ecs::World;
use helm_math::units;
use helm_physics::PhysicsBridge;

/// What a system may touch during one update.
pub struct SystemContext<'a> {
    pub world: &'a mut World,
    pub physics: &'a mut PhysicsBridge,
    /// The current tick number, starting at 1.
    pub tick: u64,
    /// Simulated time advanced by this tick.
    pub elapsed: Duration,
}

impl SystemContext<'_> {
    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        units::millis(self.elapsed)
    }

    /// Elapsed time in seconds.
    #[must_use]
    pub fn dt(&self) -> f64 {
        units::seconds(self.elapsed)
    }
}
