use helm_component::schema::{Hull, IsDestroyed};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query};
use tracing::info;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Schedules immediate destruction of anything whose hull reached zero.
pub struct HullBreachSystem;

impl System for HullBreachSystem {
    fn name(&self) -> &'static str {
        "hull_breach"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::Hull]).without(ComponentKind::IsDestroyed)
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity.get::<Hull>().is_some_and(Hull::is_breached)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        ctx.world.add(
            entity,
            IsDestroyed {
                explosion: Some("hullBreach".into()),
                ..IsDestroyed::after_millis(0.0)
            },
        )?;
        info!(tick_id = ctx.tick, entity = %entity, "hull breached");
        Ok(())
    }
}
