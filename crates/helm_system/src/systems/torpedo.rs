use helm_component::schema::{Hull, IsDestroyed, IsTorpedo, Position, Shields, Velocity};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{Query, World};
use tracing::{debug, info};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;

/// Tracks launched torpedoes. A torpedo within its detonation radius of a
/// hull-bearing entity (other than its own ship) detonates against the
/// nearest one: shields absorb first, the rest comes off the hull. Past
/// `maxRange` it self-destructs. Either way it is handed to the
/// destruction system with a zero timer.
pub struct TorpedoSystem;

impl System for TorpedoSystem {
    fn name(&self) -> &'static str {
        "torpedo"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsTorpedo, ComponentKind::Position])
            .without(ComponentKind::IsDestroyed)
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[
            ComponentKind::Hull,
            ComponentKind::Shields,
            ComponentKind::Velocity,
        ]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, torpedo: EntityId) -> Result<(), SystemError> {
        let (Some(state), Some(position)) = (
            ctx.world.get::<IsTorpedo>(torpedo).cloned(),
            ctx.world.get::<Position>(torpedo).cloned(),
        ) else {
            return Ok(());
        };
        let speed = ctx
            .world
            .get::<Velocity>(torpedo)
            .map_or(0.0, |v| v.vector().length());
        let traveled = state.distance_traveled + speed * ctx.dt();
        ctx.world
            .update::<IsTorpedo>(torpedo, |t| t.distance_traveled = traveled)?;

        if let Some(target) = nearest_target(ctx.world, torpedo, &state, &position) {
            let through = apply_damage(ctx.world, target, state.damage)?;
            ctx.world.add(
                torpedo,
                IsDestroyed {
                    explosion: Some("torpedo".into()),
                    ..IsDestroyed::after_millis(0.0)
                },
            )?;
            info!(
                tick_id = ctx.tick,
                torpedo = %torpedo,
                target = %target,
                damage = state.damage,
                hull_damage = through,
                "torpedo detonated"
            );
        } else if traveled >= state.max_range {
            ctx.world.add(
                torpedo,
                IsDestroyed {
                    explosion: Some("selfDestruct".into()),
                    ..IsDestroyed::after_millis(0.0)
                },
            )?;
            debug!(tick_id = ctx.tick, torpedo = %torpedo, traveled, "torpedo out of range");
        }
        Ok(())
    }
}

/// Closest hull-bearing entity inside the detonation radius, lowest id on
/// ties.
fn nearest_target(
    world: &World,
    torpedo: EntityId,
    state: &IsTorpedo,
    position: &Position,
) -> Option<EntityId> {
    let candidates = Query::all_of(&[ComponentKind::Hull, ComponentKind::Position]);
    world
        .query(&candidates)
        .filter(|e| e.id != torpedo && Some(e.id) != state.ship_id)
        .filter_map(|e| {
            let distance = position.distance_to(e.get::<Position>()?)?;
            (distance <= state.detonation_radius).then_some((e.id, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Returns the damage that reached the hull.
fn apply_damage(world: &mut World, target: EntityId, damage: f64) -> Result<f64, SystemError> {
    let mut through = damage;
    if world.has::<Shields>(target) {
        world.update::<Shields>(target, |s| through = s.absorb(damage))?;
    }
    if through > 0.0 {
        world.update::<Hull>(target, |h| h.value = (h.value - through).max(0.0))?;
    }
    Ok(through)
}
