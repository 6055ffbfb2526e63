//! A dependency-free integrator: every body is a point mass advanced with
//! semi-implicit Euler. Matches the rapier backend's results for bodies
//! without contacts and is cheap enough for large headless test flights.

use std::collections::BTreeMap;

use helm_math::DVec3;

use crate::backend::{BodyDesc, BodyHandle, BodyState, PhysicsBackend};

#[derive(Debug, Clone)]
struct PointMass {
    position: DVec3,
    velocity: DVec3,
    inv_mass: f64,
    force: DVec3,
}

/// Semi-implicit Euler integrator for unconstrained point masses.
#[derive(Debug, Clone, Default)]
pub struct PointMassBackend {
    gravity: DVec3,
    /// Handles are never reused.
    next_handle: u64,
    bodies: BTreeMap<BodyHandle, PointMass>,
}

impl PointMassBackend {
    /// An empty world.
    pub fn new() -> Self {
        Self {
            gravity: DVec3::ZERO,
            next_handle: 1,
            bodies: BTreeMap::new(),
        }
    }
}

impl PhysicsBackend for PointMassBackend {
    fn name(&self) -> &'static str {
        "point-mass"
    }

    fn set_gravity(&mut self, gravity: DVec3) {
        self.gravity = gravity;
    }

    fn insert_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        let inv_mass = if desc.mass > 0.0 { 1.0 / desc.mass } else { 0.0 };
        self.bodies.insert(
            handle,
            PointMass {
                position: desc.position,
                velocity: desc.velocity,
                inv_mass,
                force: DVec3::ZERO,
            },
        );
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(&handle).is_some()
    }

    fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(&handle)
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&handle).map(|b| BodyState {
            position: b.position,
            velocity: b.velocity,
        })
    }

    fn set_body_state(&mut self, handle: BodyHandle, state: &BodyState) -> bool {
        let Some(body) = self.bodies.get_mut(&handle) else {
            return false;
        };
        body.position = state.position;
        body.velocity = state.velocity;
        true
    }

    fn apply_force(&mut self, handle: BodyHandle, force: DVec3) -> bool {
        let Some(body) = self.bodies.get_mut(&handle) else {
            return false;
        };
        body.force += force;
        true
    }

    fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            body.velocity += (body.force * body.inv_mass + self.gravity) * dt;
            body.position += body.velocity * dt;
            body.force = DVec3::ZERO;
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::exercise_backend;

    #[test]
    fn test_backend_contract() {
        exercise_backend(Box::new(PointMassBackend::new()));
    }

    #[test]
    fn test_integration_is_exact_for_constant_velocity() {
        let mut backend = PointMassBackend::new();
        let h = backend.insert_body(&BodyDesc {
            velocity: DVec3::new(2.0, -1.0, 0.5),
            ..BodyDesc::default()
        });
        backend.step(0.5);
        backend.step(0.5);
        assert_eq!(
            backend.body_state(h).map(|s| s.position),
            Some(DVec3::new(2.0, -1.0, 0.5))
        );
    }
}
