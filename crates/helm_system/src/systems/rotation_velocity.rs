use helm_component::schema::{Rotation, RotationVelocity};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::Query;
use helm_math::{DQuat, DVec3};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Integrates angular velocity (rad/s, world axes) into orientation.
pub struct RotationVelocitySystem;

impl System for RotationVelocitySystem {
    fn name(&self) -> &'static str {
        "rotation_velocity"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::Rotation, ComponentKind::RotationVelocity])
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        let Some(omega) = ctx
            .world
            .get::<RotationVelocity>(entity)
            .map(|w| DVec3::new(w.x, w.y, w.z))
        else {
            return Ok(());
        };
        let angle = omega.length() * ctx.dt();
        if angle == 0.0 {
            return Ok(());
        }
        let delta = DQuat::from_axis_angle(omega.normalize(), angle);
        ctx.world.update::<Rotation>(entity, |r| {
            *r = Rotation::from_quat((delta * r.quat()).normalize());
        })?;
        Ok(())
    }
}
