//! Unit convention shared by components and the physics engine.
//!
//! One physics-engine length unit is one kilometre. Velocities are km/s and
//! elapsed simulation time crosses system boundaries as a [`Duration`].

use std::time::Duration;

/// Kilometres per physics-engine length unit.
pub const KM_PER_PHYSICS_UNIT: f64 = 1.0;

/// Distance under which two entities in the same frame count as touching.
pub const ARRIVAL_DISTANCE_KM: f64 = 5.0;

/// Convert an elapsed duration to fractional seconds.
#[must_use]
pub fn seconds(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64()
}

/// Convert an elapsed duration to fractional milliseconds.
#[must_use]
pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Convert kilometres to physics-engine units.
#[must_use]
pub fn km_to_physics(km: f64) -> f64 {
    km / KM_PER_PHYSICS_UNIT
}

/// Convert physics-engine units to kilometres.
#[must_use]
pub fn physics_to_km(units: f64) -> f64 {
    units * KM_PER_PHYSICS_UNIT
}
