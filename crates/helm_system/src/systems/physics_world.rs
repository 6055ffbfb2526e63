use helm_component::{ComponentKind, EntityId};
use helm_ecs::Query;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Steps each physics world's native instance and writes body state back.
pub struct PhysicsWorldSystem;

impl System for PhysicsWorldSystem {
    fn name(&self) -> &'static str {
        "physics_world"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::PhysicsWorld])
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[
            ComponentKind::PhysicsHandles,
            ComponentKind::Position,
            ComponentKind::Velocity,
        ]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        let dt = ctx.dt();
        if dt <= 0.0 {
            return Ok(());
        }
        ctx.physics.step_world(ctx.world, entity, dt)?;
        Ok(())
    }
}
