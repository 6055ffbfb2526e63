use helm_component::schema::{IsDestroyed, IsShip, IsShipSystem};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::Query;
use tracing::info;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::despawn;

/// Runs destruction timers. When `timer` reaches `timeToDestroy` the
/// entity's physics handles are released in every world it belongs to and
/// the entity is removed. A destroyed ship takes its ship systems with it.
pub struct IsDestroyedSystem;

impl System for IsDestroyedSystem {
    fn name(&self) -> &'static str {
        "is_destroyed"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsDestroyed])
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[
            ComponentKind::IsShip,
            ComponentKind::IsShipSystem,
            ComponentKind::PhysicsHandles,
        ]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        let elapsed = ctx.elapsed_ms();
        let mut due = false;
        ctx.world.update::<IsDestroyed>(entity, |d| {
            d.timer += elapsed;
            due = d.is_due();
        })?;
        if !due {
            return Ok(());
        }

        if ctx.world.has::<IsShip>(entity) {
            let systems: Vec<EntityId> = ctx
                .world
                .query_with(move |e| {
                    e.get::<IsShipSystem>()
                        .is_some_and(|s| s.ship_id == Some(entity))
                })
                .map(|e| e.id)
                .collect();
            for system in systems {
                despawn(ctx, system)?;
            }
        }
        let released = despawn(ctx, entity)?;
        info!(tick_id = ctx.tick, entity = %entity, released, "entity destroyed");
        Ok(())
    }
}
