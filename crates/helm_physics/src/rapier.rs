//! Rapier-backed native world.
//!
//! Colliders are sensors with zero density: bodies pass through each other
//! and carry exactly the mass given in their [`BodyDesc`]. Contact effects
//! (torpedo detonation) are resolved by systems from positions, so the
//! engine is used for integration under forces and gravity.

use helm_math::DVec3;
use rapier3d_f64::prelude::*;

use crate::backend::{BodyDesc, BodyHandle, BodyState, PhysicsBackend};

/// A rapier3d world with one rigid body per entity.
pub struct RapierBackend {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl RapierBackend {
    /// An empty world with zero gravity.
    pub fn new() -> Self {
        Self {
            gravity: Vector::zeros(),
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    fn pack(handle: RigidBodyHandle) -> BodyHandle {
        let (index, generation) = handle.into_raw_parts();
        BodyHandle((u64::from(generation) << 32) | u64::from(index))
    }

    fn unpack(handle: BodyHandle) -> RigidBodyHandle {
        let index = (handle.0 & 0xFFFF_FFFF) as u32;
        let generation = (handle.0 >> 32) as u32;
        RigidBodyHandle::from_raw_parts(index, generation)
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn to_vector(v: DVec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn from_vector(v: &Vector<Real>) -> DVec3 {
    DVec3::new(v.x, v.y, v.z)
}

impl PhysicsBackend for RapierBackend {
    fn name(&self) -> &'static str {
        "rapier"
    }

    fn set_gravity(&mut self, gravity: DVec3) {
        self.gravity = to_vector(gravity);
    }

    fn insert_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(desc.position))
            .linvel(to_vector(desc.velocity))
            .additional_mass(desc.mass)
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::ball(desc.radius)
            .density(0.0)
            .sensor(true)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        Self::pack(handle)
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies
            .remove(
                Self::unpack(handle),
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(Self::unpack(handle))
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies.get(Self::unpack(handle)).map(|b| BodyState {
            position: from_vector(b.translation()),
            velocity: from_vector(b.linvel()),
        })
    }

    fn set_body_state(&mut self, handle: BodyHandle, state: &BodyState) -> bool {
        let Some(body) = self.bodies.get_mut(Self::unpack(handle)) else {
            return false;
        };
        body.set_translation(to_vector(state.position), true);
        body.set_linvel(to_vector(state.velocity), true);
        true
    }

    fn apply_force(&mut self, handle: BodyHandle, force: DVec3) -> bool {
        let Some(body) = self.bodies.get_mut(Self::unpack(handle)) else {
            return false;
        };
        body.add_force(to_vector(force), true);
        true
    }

    fn step(&mut self, dt: f64) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
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
        exercise_backend(Box::new(RapierBackend::new()));
    }

    #[test]
    fn test_handle_packing() {
        let handle = RigidBodyHandle::from_raw_parts(7, 3);
        let packed = RapierBackend::pack(handle);
        assert_eq!(packed, BodyHandle((3 << 32) | 7));
        assert_eq!(RapierBackend::unpack(packed), handle);
    }

    #[test]
    fn test_gravity_accelerates() {
        let mut backend = RapierBackend::new();
        backend.set_gravity(DVec3::new(0.0, -1.0, 0.0));
        let h = backend.insert_body(&BodyDesc::default());
        backend.step(1.0);
        let v = backend.body_state(h).unwrap().velocity;
        assert!((v.y + 1.0).abs() < 1e-6, "{v:?}");
    }
}
