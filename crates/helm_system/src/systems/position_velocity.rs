use helm_component::schema::{PhysicsHandles, Position, Velocity};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query};
use helm_math::DVec3;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// `position += velocity * dt` for entities no physics world manages.
pub struct PositionVelocitySystem;

impl System for PositionVelocitySystem {
    fn name(&self) -> &'static str {
        "position_velocity"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::Position, ComponentKind::Velocity])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        !entity
            .get::<PhysicsHandles>()
            .is_some_and(PhysicsHandles::is_attached)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        let dt = ctx.dt();
        let velocity = ctx
            .world
            .get::<Velocity>(entity)
            .map_or(DVec3::ZERO, Velocity::vector);
        if velocity == DVec3::ZERO || dt == 0.0 {
            return Ok(());
        }
        ctx.world.update::<Position>(entity, |p| {
            let next = DVec3::from(p.coordinates()) + velocity * dt;
            p.set_coordinates(next);
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_component::schema::PhysicsWorld;

    use super::*;
    use crate::systems::testing::Harness;

    #[test]
    fn test_one_second_at_one_km_per_second() {
        let mut h = Harness::new(vec![Box::new(PositionVelocitySystem)]);
        let e = h
            .world
            .spawn([
                Position::at(0.0, 0.0, 0.0).into_data(),
                Velocity { x: 1.0, y: 0.0, z: 0.0 }.into_data(),
            ])
            .unwrap();
        h.tick_ms(1000);
        let p = h.world.get::<Position>(e).unwrap();
        assert_eq!((p.x, p.y, p.z), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_physics_bodies_are_left_alone() {
        let mut h = Harness::new(vec![Box::new(PositionVelocitySystem)]);
        let world = h.world.spawn([PhysicsWorld::default().into_data()]).unwrap();
        let e = h
            .world
            .spawn([
                Position::default().into_data(),
                Velocity { x: 1.0, y: 0.0, z: 0.0 }.into_data(),
            ])
            .unwrap();
        h.physics.attach_body(&mut h.world, world, e, None).unwrap();
        let report = h.tick_ms(1000);
        assert_eq!(report.updates, 0);
        assert_eq!(h.world.get::<Position>(e).unwrap().x, 0.0);
    }
}
