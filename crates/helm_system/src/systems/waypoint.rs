use helm_component::schema::{Autopilot, IsWaypoint, Position};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query};
use helm_math::units::ARRIVAL_DISTANCE_KM;
use tracing::debug;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::despawn;

/// Consumes waypoints. A waypoint is removed when its assigned ship comes
/// within arrival distance in the same frame, clearing the ship's
/// autopilot destination in the same tick, or when the ship is gone.
pub struct WaypointSystem;

impl System for WaypointSystem {
    fn name(&self) -> &'static str {
        "waypoint"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsWaypoint])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity
            .get::<IsWaypoint>()
            .is_some_and(|w| w.assigned_ship_id.is_some())
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[ComponentKind::Autopilot, ComponentKind::Position]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, waypoint: EntityId) -> Result<(), SystemError> {
        let Some(ship) = ctx
            .world
            .get::<IsWaypoint>(waypoint)
            .and_then(|w| w.assigned_ship_id)
        else {
            return Ok(());
        };

        if !ctx.world.contains(ship) {
            despawn(ctx, waypoint)?;
            debug!(tick_id = ctx.tick, waypoint = %waypoint, ship = %ship, "waypoint orphaned");
            return Ok(());
        }

        let arrived = match (
            ctx.world.get::<Position>(waypoint),
            ctx.world.get::<Position>(ship),
        ) {
            (Some(target), Some(at)) => target
                .distance_to(at)
                .is_some_and(|d| d <= ARRIVAL_DISTANCE_KM),
            _ => false,
        };
        if !arrived {
            return Ok(());
        }

        despawn(ctx, waypoint)?;
        let heading_here = ctx
            .world
            .get::<Autopilot>(ship)
            .is_some_and(|a| a.destination_waypoint_id == Some(waypoint));
        if heading_here {
            ctx.world
                .update::<Autopilot>(ship, |a| a.destination_waypoint_id = None)?;
        }
        debug!(tick_id = ctx.tick, waypoint = %waypoint, ship = %ship, "waypoint reached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;

    use super::*;
    use crate::systems::testing::Harness;

    fn setup(h: &mut Harness, ship_x: f64) -> (EntityId, EntityId) {
        let ship = h
            .world
            .spawn([Position::at(ship_x, 0.0, 0.0).into_data()])
            .unwrap();
        let waypoint = h
            .world
            .spawn([
                IsWaypoint {
                    assigned_ship_id: Some(ship),
                }
                .into_data(),
                Position::at(0.0, 0.0, 0.0).into_data(),
            ])
            .unwrap();
        h.world
            .add(
                ship,
                Autopilot {
                    destination_waypoint_id: Some(waypoint),
                    forward_autopilot: true,
                    ..Autopilot::default()
                },
            )
            .unwrap();
        (ship, waypoint)
    }

    #[test]
    fn test_arrival_removes_waypoint_and_clears_destination() {
        let mut h = Harness::new(vec![Box::new(WaypointSystem)]);
        let (ship, waypoint) = setup(&mut h, 4.9);
        let report = h.tick_ms(16);
        assert_eq!(report.removed, vec![waypoint]);
        assert_eq!(
            h.world.get::<Autopilot>(ship).unwrap().destination_waypoint_id,
            None
        );
    }

    #[test]
    fn test_not_yet_arrived() {
        let mut h = Harness::new(vec![Box::new(WaypointSystem)]);
        let (ship, waypoint) = setup(&mut h, 5.1);
        h.tick_ms(16);
        assert!(h.world.contains(waypoint));
        assert_eq!(
            h.world.get::<Autopilot>(ship).unwrap().destination_waypoint_id,
            Some(waypoint)
        );
    }

    #[test]
    fn test_orphaned_waypoint_is_removed() {
        let mut h = Harness::new(vec![Box::new(WaypointSystem)]);
        let (ship, waypoint) = setup(&mut h, 100.0);
        h.world.remove_entity(ship).unwrap();
        let report = h.tick_ms(16);
        assert!(report.removed.contains(&waypoint));
    }
}
