//! The built-in simulation systems.
//!
//! Default deployment order (see [`default_systems`]):
//!
//! 1. `autopilot`: steer ships toward their destination.
//! 2. `physics_world`: step every native world and sync bodies back.
//! 3. `position_velocity`: integrate bodies outside any physics world.
//! 4. `rotation_velocity`: integrate angular velocity.
//! 5. `torpedo_launcher`: launcher state machine, torpedo launch.
//! 6. `torpedo`: range tracking and detonation.
//! 7. `hull_breach`: schedule destruction of zero-hull entities.
//! 8. `is_destroyed`: destruction timers; release handles, then remove.
//! 9. `waypoint`: consume reached or orphaned waypoints.
//! 10. `trigger`: fire triggers whose conditions hold.
//! 11. `timeline`: advance active timelines.
//!
//! Motion runs before anything that reads positions, damage before the
//! destruction timer, and destruction before waypoint arrival checks.

pub mod automation;

mod autopilot;
mod hull_breach;
mod is_destroyed;
mod physics_world;
mod position_velocity;
mod rotation_velocity;
mod timeline;
mod torpedo;
mod torpedo_launcher;
mod trigger;
mod waypoint;

pub use autopilot::AutopilotSystem;
pub use hull_breach::HullBreachSystem;
pub use is_destroyed::IsDestroyedSystem;
pub use physics_world::PhysicsWorldSystem;
pub use position_velocity::PositionVelocitySystem;
pub use rotation_velocity::RotationVelocitySystem;
pub use timeline::TimelineSystem;
pub use torpedo::TorpedoSystem;
pub use torpedo_launcher::TorpedoLauncherSystem;
pub use trigger::TriggerSystem;
pub use waypoint::WaypointSystem;

use helm_component::EntityId;
use tracing::debug;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Release every physics handle `entity` holds, then remove it. All
/// system-driven removals go through here so handles never outlive bodies.
pub(crate) fn despawn(ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<usize, SystemError> {
    let released = ctx.physics.detach_all(ctx.world, entity)?;
    ctx.world.remove_entity(entity)?;
    debug!(tick_id = ctx.tick, entity = %entity, released, "entity despawned");
    Ok(released)
}

/// Every built-in system, in deployment order.
pub fn default_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(AutopilotSystem),
        Box::new(PhysicsWorldSystem),
        Box::new(PositionVelocitySystem),
        Box::new(RotationVelocitySystem),
        Box::new(TorpedoLauncherSystem),
        Box::new(TorpedoSystem),
        Box::new(HullBreachSystem),
        Box::new(IsDestroyedSystem),
        Box::new(WaypointSystem),
        Box::new(TriggerSystem),
        Box::new(TimelineSystem),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use helm_ecs::World;
    use helm_physics::{BackendKind, PhysicsBridge};

    use crate::scheduler::{Scheduler, TickReport};
    use crate::system::System;

    pub(crate) struct Harness {
        pub world: World,
        pub physics: PhysicsBridge,
        scheduler: Scheduler,
    }

    impl Harness {
        /// A flight running only `systems`.
        pub(crate) fn new(systems: Vec<Box<dyn System>>) -> Self {
            let world = World::with_standard_registry();
            let mut scheduler = Scheduler::new();
            for system in systems {
                scheduler.register(world.registry(), system).unwrap();
            }
            Self {
                world,
                physics: PhysicsBridge::new(BackendKind::PointMass),
                scheduler,
            }
        }

        /// One tick that must not fault.
        pub(crate) fn tick_ms(&mut self, ms: u64) -> TickReport {
            let report = self.step_ms(ms);
            assert!(report.faults.is_empty(), "unexpected faults: {:?}", report.faults);
            report
        }

        pub(crate) fn step_ms(&mut self, ms: u64) -> TickReport {
            self.scheduler.run_tick(
                &mut self.world,
                &mut self.physics,
                Duration::from_millis(ms),
            )
        }
    }
}
