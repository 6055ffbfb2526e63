use helm_component::schema::{
    Autopilot, IsImpulseEngines, IsShipSystem, PhysicsHandles, Position, Rotation, Velocity,
};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query, World};
use helm_math::{DQuat, DVec3};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Steers ships with forward autopilot toward their destination waypoint
/// (or desired coordinates) at the impulse engines' speed, slowing so the
/// final step lands on the target. Ships in a physics world are steered
/// with a force; others get their velocity set directly.
pub struct AutopilotSystem;

impl System for AutopilotSystem {
    fn name(&self) -> &'static str {
        "autopilot"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::Autopilot, ComponentKind::Position])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity
            .get::<Autopilot>()
            .is_some_and(|a| a.forward_autopilot || a.rotation_autopilot)
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[
            ComponentKind::IsImpulseEngines,
            ComponentKind::IsShipSystem,
            ComponentKind::PhysicsHandles,
            ComponentKind::Rotation,
            ComponentKind::Velocity,
        ]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, ship: EntityId) -> Result<(), SystemError> {
        let dt = ctx.dt();
        let (Some(autopilot), Some(position)) = (
            ctx.world.get::<Autopilot>(ship).cloned(),
            ctx.world.get::<Position>(ship).cloned(),
        ) else {
            return Ok(());
        };

        let target = match autopilot
            .destination_waypoint_id
            .and_then(|wp| ctx.world.get::<Position>(wp))
        {
            Some(waypoint) if position.same_frame(waypoint) => Some(waypoint.coordinates()),
            Some(_) => None,
            None => autopilot.desired_coordinates,
        };
        let Some(target) = target else {
            return Ok(());
        };

        let offset = DVec3::from(target) - DVec3::from(position.coordinates());
        let distance = offset.length();
        let heading = if distance > f64::EPSILON {
            offset / distance
        } else {
            DVec3::ZERO
        };

        if autopilot.rotation_autopilot && heading != DVec3::ZERO {
            let facing = Rotation::from_quat(DQuat::from_rotation_arc(DVec3::Z, heading));
            if ctx.world.has::<Rotation>(ship) {
                ctx.world.update::<Rotation>(ship, |r| *r = facing)?;
            } else {
                ctx.world.add(ship, facing)?;
            }
        }

        if !autopilot.forward_autopilot || dt <= 0.0 {
            return Ok(());
        }
        let speed = engine_speed(ctx.world, ship).min(distance / dt);
        let desired = heading * speed;

        let attached = ctx
            .world
            .get::<PhysicsHandles>(ship)
            .filter(|h| h.is_attached())
            .map(|h| h.mass);
        match attached {
            Some(mass) => {
                let current = ctx
                    .world
                    .get::<Velocity>(ship)
                    .map_or(DVec3::ZERO, Velocity::vector);
                let force = (desired - current) * mass / dt;
                ctx.physics.apply_force(ctx.world, ship, force)?;
            }
            None if ctx.world.has::<Velocity>(ship) => {
                ctx.world
                    .update::<Velocity>(ship, |v| *v = Velocity::from_vector(desired))?;
            }
            None => ctx.world.add(ship, Velocity::from_vector(desired))?,
        }
        Ok(())
    }
}

/// The ship's impulse speed in km/s: its engines' target speed when set,
/// otherwise cruising speed. Engines live on the ship itself or on one of
/// its ship-system entities. No engines, no thrust.
fn engine_speed(world: &World, ship: EntityId) -> f64 {
    let engines = world.get::<IsImpulseEngines>(ship).or_else(|| {
        world
            .query_with(move |e| {
                e.get::<IsShipSystem>()
                    .is_some_and(|s| s.ship_id == Some(ship))
            })
            .find_map(|e| e.get::<IsImpulseEngines>())
    });
    engines.map_or(0.0, |e| {
        if e.target_speed > 0.0 {
            e.target_speed
        } else {
            e.cruising_speed
        }
    })
}
