use helm_component::schema::{
    IsShipSystem, IsTorpedo, IsTorpedoLauncher, LauncherStatus, PhysicsHandles, Position,
    Rotation, Velocity,
};
use helm_component::{Component, ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query, World};
use helm_math::DVec3;
use helm_physics::BodyDesc;
use tracing::debug;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::despawn;

/// Collision radius of a launched torpedo, km.
const TORPEDO_RADIUS_KM: f64 = 0.005;
/// Mass of a launched torpedo, kg.
const TORPEDO_MASS_KG: f64 = 250.0;

/// Advances launchers through their timed states:
///
/// - `loading` → `loaded` after `loadTime`, creating the torpedo entity.
/// - `firing` → `ready` after `fireTime`, launching the loaded torpedo.
/// - `unloading` → `ready` after `loadTime`, discarding the torpedo.
///
/// `ready` and `loaded` are left to crew commands, so the system never
/// matches them and a completed transition cannot repeat.
pub struct TorpedoLauncherSystem;

impl System for TorpedoLauncherSystem {
    fn name(&self) -> &'static str {
        "torpedo_launcher"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsTorpedoLauncher])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity.get::<IsTorpedoLauncher>().is_some_and(|l| {
            matches!(
                l.status,
                LauncherStatus::Loading | LauncherStatus::Firing | LauncherStatus::Unloading
            )
        })
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[
            ComponentKind::IsTorpedo,
            ComponentKind::IsShipSystem,
            ComponentKind::PhysicsHandles,
            ComponentKind::Position,
            ComponentKind::Rotation,
            ComponentKind::Velocity,
        ]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, launcher: EntityId) -> Result<(), SystemError> {
        let Some(state) = ctx.world.get::<IsTorpedoLauncher>(launcher).cloned() else {
            return Ok(());
        };
        let progress = state.progress + ctx.elapsed_ms();
        let torpedo = state.torpedo_entity.filter(|t| ctx.world.contains(*t));

        let duration = match state.status {
            LauncherStatus::Firing => state.fire_time,
            _ => state.load_time,
        };
        if progress < duration {
            ctx.world
                .update::<IsTorpedoLauncher>(launcher, |l| l.progress = progress)?;
            return Ok(());
        }

        let (status, torpedo_entity) = match state.status {
            LauncherStatus::Loading => {
                let torpedo = match torpedo {
                    Some(t) => t,
                    None => {
                        let ship = firing_ship(ctx.world, launcher);
                        ctx.world.spawn([IsTorpedo {
                            launcher_id: Some(launcher),
                            ship_id: ship,
                            ..IsTorpedo::default()
                        }
                        .into_data()])?
                    }
                };
                (LauncherStatus::Loaded, Some(torpedo))
            }
            LauncherStatus::Firing => {
                if let Some(t) = torpedo {
                    launch(ctx, launcher, t)?;
                }
                (LauncherStatus::Ready, None)
            }
            LauncherStatus::Unloading => {
                if let Some(t) = torpedo {
                    despawn(ctx, t)?;
                }
                (LauncherStatus::Ready, None)
            }
            LauncherStatus::Ready | LauncherStatus::Loaded => return Ok(()),
        };

        ctx.world.update::<IsTorpedoLauncher>(launcher, |l| {
            l.status = status;
            l.progress = 0.0;
            l.torpedo_entity = torpedo_entity;
        })?;
        debug!(tick_id = ctx.tick, launcher = %launcher, ?status, "launcher transition");
        Ok(())
    }
}

/// The ship a launcher fires from: its owning ship, or the launcher itself
/// when it is mounted directly on a positioned entity.
fn firing_ship(world: &World, launcher: EntityId) -> Option<EntityId> {
    world
        .get::<IsShipSystem>(launcher)
        .and_then(|s| s.ship_id)
        .or_else(|| world.has::<Position>(launcher).then_some(launcher))
}

/// Place `torpedo` at the ship, moving along the ship's forward axis at its
/// launch speed on top of the ship's own velocity, and add it to the ship's
/// physics world if the ship has one.
fn launch(ctx: &mut SystemContext<'_>, launcher: EntityId, torpedo: EntityId) -> Result<(), SystemError> {
    let ship = firing_ship(ctx.world, launcher).ok_or_else(|| {
        SystemError::Invariant(format!("launcher {launcher} has no ship to fire from"))
    })?;
    let position = ctx.world.get::<Position>(ship).cloned().ok_or_else(|| {
        SystemError::Invariant(format!("ship {ship} has no position to launch from"))
    })?;
    let ship_velocity = ctx
        .world
        .get::<Velocity>(ship)
        .map_or(DVec3::ZERO, Velocity::vector);
    let rotation = ctx.world.get::<Rotation>(ship).cloned().unwrap_or_default();
    let speed = ctx
        .world
        .get::<IsTorpedo>(torpedo)
        .map_or(0.0, |t| t.speed);
    let velocity = ship_velocity + rotation.orientation().forward() * speed;

    ctx.world.add(torpedo, position.clone())?;
    ctx.world.add(torpedo, Velocity::from_vector(velocity))?;
    ctx.world.add(torpedo, rotation)?;
    ctx.world.update::<IsTorpedo>(torpedo, |t| {
        t.ship_id = Some(ship);
        t.launcher_id = Some(launcher);
        t.distance_traveled = 0.0;
    })?;

    let physics_world = ctx
        .world
        .get::<PhysicsHandles>(ship)
        .and_then(|h| h.handles.keys().next().copied());
    if let Some(world) = physics_world {
        ctx.physics.attach_body(
            ctx.world,
            world,
            torpedo,
            Some(BodyDesc {
                position: position.coordinates().into(),
                velocity,
                radius: TORPEDO_RADIUS_KM,
                mass: TORPEDO_MASS_KG,
            }),
        )?;
    }
    debug!(tick_id = ctx.tick, launcher = %launcher, torpedo = %torpedo, ship = %ship, "torpedo launched");
    Ok(())
}
