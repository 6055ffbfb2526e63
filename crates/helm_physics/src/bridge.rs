//! The physics bridge: keeps native worlds in step with the entity store.
//!
//! Each entity carrying `physicsWorld` owns one native world, created on
//! first use. Body entities carry `physicsHandles`. The two tables mirror
//! each other: `world.bodies[body] == body.handles[world]` for every
//! attached pair, and both sides change in the same call.
//!
//! Lengths are converted with [`helm_math::units`] on the way in and out.

use std::collections::BTreeMap;

use helm_component::schema::{PhysicsHandles, PhysicsWorld, Position, Velocity};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{Query, RemovedEntity, World};
use helm_math::DVec3;
use helm_math::units::{km_to_physics, physics_to_km};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendKind, BodyDesc, BodyHandle, BodyState, PhysicsBackend};
use crate::error::PhysicsError;

/// Lifetime counters. `detached` counts explicit detaches only; handles
/// released because an entity was dropped while still attached count as
/// `forced_releases`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub attached: u64,
    pub detached: u64,
    pub forced_releases: u64,
    pub worlds_created: u64,
    pub worlds_destroyed: u64,
}

/// Native worlds and bodies released by a teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub worlds: usize,
    pub bodies: usize,
}

/// Owns the native physics worlds and keeps the store's handle tables in step with them.
pub struct PhysicsBridge {
    kind: BackendKind,
    worlds: BTreeMap<EntityId, Box<dyn PhysicsBackend>>,
    stats: BridgeStats,
}

impl PhysicsBridge {
    /// A bridge with no native worlds, creating them with `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            worlds: BTreeMap::new(),
            stats: BridgeStats::default(),
        }
    }

    /// The backend new worlds are created with.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Lifetime counters.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Number of live native worlds.
    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// Bodies in the native world of `world_entity`.
    pub fn body_count(&self, world_entity: EntityId) -> usize {
        self.worlds
            .get(&world_entity)
            .map_or(0, |w| w.body_count())
    }

    /// Does `handle` still name a body in `world_entity`'s native world?
    pub fn resolves(&self, world_entity: EntityId, handle: BodyHandle) -> bool {
        self.worlds
            .get(&world_entity)
            .is_some_and(|w| w.contains_body(handle))
    }

    /// Native state of a body, in km and km/s.
    pub fn body_state(&self, world_entity: EntityId, handle: BodyHandle) -> Option<BodyState> {
        self.worlds
            .get(&world_entity)
            .and_then(|w| w.body_state(handle))
            .map(|s| BodyState {
                position: s.position * physics_to_km(1.0),
                velocity: s.velocity * physics_to_km(1.0),
            })
    }

    /// Build a body description from an entity's components.
    pub fn body_desc(store: &World, body: EntityId) -> BodyDesc {
        let defaults = PhysicsHandles::default();
        let handles = store.get::<PhysicsHandles>(body).unwrap_or(&defaults);
        BodyDesc {
            position: store
                .get::<Position>(body)
                .map_or(DVec3::ZERO, |p| p.coordinates().into()),
            velocity: store
                .get::<Velocity>(body)
                .map_or(DVec3::ZERO, Velocity::vector),
            radius: handles.radius,
            mass: handles.mass,
        }
    }

    /// Create a native body for `body` in `world_entity`'s world and record
    /// the handle on both entities. Without an explicit `desc` the body is
    /// built from the entity's position, velocity and physicsHandles.
    pub fn attach_body(
        &mut self,
        store: &mut World,
        world_entity: EntityId,
        body: EntityId,
        desc: Option<BodyDesc>,
    ) -> Result<BodyHandle, PhysicsError> {
        if !store.contains(body) {
            return Err(helm_ecs::WorldError::EntityNotFound(body).into());
        }
        let world = store
            .get::<PhysicsWorld>(world_entity)
            .ok_or(PhysicsError::NotAPhysicsWorld(world_entity))?;
        let attached_here = world.bodies.contains_key(&body)
            || store
                .get::<PhysicsHandles>(body)
                .is_some_and(|h| h.handles.contains_key(&world_entity));
        if attached_here {
            return Err(PhysicsError::AlreadyAttached {
                world: world_entity,
                body,
            });
        }

        let desc = desc.unwrap_or_else(|| Self::body_desc(store, body));
        if !store.has::<PhysicsHandles>(body) {
            store.add(
                body,
                PhysicsHandles {
                    radius: desc.radius,
                    mass: desc.mass,
                    ..PhysicsHandles::default()
                },
            )?;
        }

        let native_desc = BodyDesc {
            position: desc.position * km_to_physics(1.0),
            velocity: desc.velocity * km_to_physics(1.0),
            radius: km_to_physics(desc.radius),
            mass: desc.mass,
        };
        let handle = self.native(store, world_entity)?.insert_body(&native_desc);
        store.update::<PhysicsWorld>(world_entity, |w| {
            w.bodies.insert(body, handle.0);
        })?;
        store.update::<PhysicsHandles>(body, |h| {
            h.handles.insert(world_entity, handle.0);
        })?;
        self.stats.attached += 1;
        debug!(world = %world_entity, body = %body, handle = handle.0, "body attached");
        Ok(handle)
    }

    /// Remove `body` from `world_entity`'s native world and from both
    /// handle tables.
    pub fn detach_body(
        &mut self,
        store: &mut World,
        world_entity: EntityId,
        body: EntityId,
    ) -> Result<(), PhysicsError> {
        let handle = store
            .get::<PhysicsHandles>(body)
            .and_then(|h| h.handles.get(&world_entity).copied())
            .or_else(|| {
                store
                    .get::<PhysicsWorld>(world_entity)
                    .and_then(|w| w.bodies.get(&body).copied())
            })
            .ok_or(PhysicsError::NotAttached {
                world: world_entity,
                body,
            })?;

        match self.worlds.get_mut(&world_entity) {
            Some(native) => {
                if !native.remove_body(BodyHandle(handle)) {
                    warn!(world = %world_entity, body = %body, handle, "handle did not resolve on detach");
                }
            }
            None => warn!(world = %world_entity, body = %body, "detach from a world with no native instance"),
        }

        if store.has::<PhysicsWorld>(world_entity) {
            store.update::<PhysicsWorld>(world_entity, |w| {
                w.bodies.remove(&body);
            })?;
        }
        if store.has::<PhysicsHandles>(body) {
            store.update::<PhysicsHandles>(body, |h| {
                h.handles.remove(&world_entity);
            })?;
        }
        self.stats.detached += 1;
        debug!(world = %world_entity, body = %body, handle, "body detached");
        Ok(())
    }

    /// Detach `body` from every world it is registered in. Returns the
    /// number of handles released.
    pub fn detach_all(&mut self, store: &mut World, body: EntityId) -> Result<usize, PhysicsError> {
        let worlds: Vec<EntityId> = store
            .get::<PhysicsHandles>(body)
            .map(|h| h.handles.keys().copied().collect())
            .unwrap_or_default();
        for world in &worlds {
            self.detach_body(store, *world, body)?;
        }
        Ok(worlds.len())
    }

    /// Release what `kind` on `entity` holds natively before that component
    /// is removed: a body's handles in every world, or every body of a
    /// world. Other kinds hold nothing. Returns the number of detaches.
    pub fn release_component(
        &mut self,
        store: &mut World,
        entity: EntityId,
        kind: ComponentKind,
    ) -> Result<usize, PhysicsError> {
        match kind {
            ComponentKind::PhysicsHandles => self.detach_all(store, entity),
            ComponentKind::PhysicsWorld => {
                let bodies: Vec<EntityId> = store
                    .get::<PhysicsWorld>(entity)
                    .map(|w| w.bodies.keys().copied().collect())
                    .unwrap_or_default();
                for body in &bodies {
                    self.detach_body(store, entity, *body)?;
                }
                if self.worlds.remove(&entity).is_some() {
                    self.stats.worlds_destroyed += 1;
                }
                Ok(bodies.len())
            }
            _ => Ok(0),
        }
    }

    /// Apply a force (kg·km/s²) to `body` in every world it belongs to,
    /// for the next step only.
    pub fn apply_force(
        &mut self,
        store: &World,
        body: EntityId,
        force: DVec3,
    ) -> Result<usize, PhysicsError> {
        let handles = store
            .get::<PhysicsHandles>(body)
            .map(|h| h.handles.clone())
            .unwrap_or_default();
        let mut applied = 0;
        for (world, handle) in handles {
            let native = self
                .worlds
                .get_mut(&world)
                .ok_or(PhysicsError::UnknownWorld(world))?;
            if native.apply_force(BodyHandle(handle), force * km_to_physics(1.0)) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Advance one world by `dt` seconds: push each body's position and
    /// velocity into the engine, step, and write the results back.
    /// Returns the number of bodies synced.
    pub fn step_world(
        &mut self,
        store: &mut World,
        world_entity: EntityId,
        dt: f64,
    ) -> Result<usize, PhysicsError> {
        let bodies: Vec<(EntityId, BodyHandle)> = store
            .get::<PhysicsWorld>(world_entity)
            .ok_or(PhysicsError::NotAPhysicsWorld(world_entity))?
            .bodies
            .iter()
            .map(|(body, handle)| (*body, BodyHandle(*handle)))
            .collect();

        let native = self.native(store, world_entity)?;
        for (body, handle) in &bodies {
            let Some(position) = store.get::<Position>(*body) else {
                continue;
            };
            let velocity = store
                .get::<Velocity>(*body)
                .map_or(DVec3::ZERO, Velocity::vector);
            let state = BodyState {
                position: DVec3::from(position.coordinates()) * km_to_physics(1.0),
                velocity: velocity * km_to_physics(1.0),
            };
            if !native.set_body_state(*handle, &state) {
                warn!(world = %world_entity, body = %body, handle = handle.0, "stale physics handle");
            }
        }

        native.step(dt);

        let mut synced = 0;
        for (body, handle) in bodies {
            if !store.contains(body) {
                continue;
            }
            let Some(state) = native.body_state(handle) else {
                continue;
            };
            let position = state.position * physics_to_km(1.0);
            let velocity = state.velocity * physics_to_km(1.0);
            if store.has::<Position>(body) {
                store.update::<Position>(body, |p| p.set_coordinates(position))?;
            }
            if store.has::<Velocity>(body) {
                store.update::<Velocity>(body, |v| *v = Velocity::from_vector(velocity))?;
            }
            synced += 1;
        }
        Ok(synced)
    }

    /// Release native state for entities dropped at a tick boundary. A body
    /// dropped while still holding handles is a leak: it is logged at error
    /// and its handles are force-released. A dropped world entity takes its
    /// native world with it. Returns the number of forced releases.
    pub fn release_removed(&mut self, store: &mut World, removed: &[RemovedEntity]) -> usize {
        let mut forced = 0;
        for entity in removed {
            if let Some(handles) = entity.record.get::<PhysicsHandles>() {
                if !handles.handles.is_empty() {
                    error!(
                        entity = %entity.id,
                        handles = handles.handles.len(),
                        "physics handle leak: entity removed while attached, forcing release"
                    );
                }
                for (world, handle) in &handles.handles {
                    if let Some(native) = self.worlds.get_mut(world) {
                        native.remove_body(BodyHandle(*handle));
                    }
                    if store.has::<PhysicsWorld>(*world) {
                        if let Err(e) = store.update::<PhysicsWorld>(*world, |w| {
                            w.bodies.remove(&entity.id);
                        }) {
                            warn!(world = %world, error = %e, "could not clear leaked body entry");
                        }
                    }
                    forced += 1;
                    self.stats.forced_releases += 1;
                }
            }
            if let Some(world) = entity.record.get::<PhysicsWorld>() {
                self.destroy_world(store, entity.id, world);
            }
        }
        forced
    }

    /// Rebuild every native world from the store's handle tables, issuing
    /// fresh handles. Used after restoring a snapshot, whose stored handles
    /// refer to native worlds that no longer exist.
    pub fn rebuild(&mut self, store: &mut World) -> Result<usize, PhysicsError> {
        self.worlds.clear();

        let world_ids = store.query_ids(&Query::all_of(&[ComponentKind::PhysicsWorld]));
        for world in &world_ids {
            store.update::<PhysicsWorld>(*world, |w| w.bodies.clear())?;
            self.native(store, *world)?;
        }

        let mut attached = 0;
        let body_ids = store.query_ids(&Query::all_of(&[ComponentKind::PhysicsHandles]));
        for body in body_ids {
            let worlds: Vec<EntityId> = store
                .get::<PhysicsHandles>(body)
                .map(|h| h.handles.keys().copied().collect())
                .unwrap_or_default();
            store.update::<PhysicsHandles>(body, |h| h.handles.clear())?;
            for world in worlds {
                if store.has::<PhysicsWorld>(world) {
                    self.attach_body(store, world, body, None)?;
                    attached += 1;
                } else {
                    warn!(body = %body, world = %world, "dropping handle to a missing physics world");
                }
            }
        }
        info!(worlds = world_ids.len(), bodies = attached, "physics rebuilt");
        Ok(attached)
    }

    /// Drop every native world and body. The store's tables are left as
    /// they are; the store is discarded with the flight.
    pub fn teardown(&mut self) -> TeardownReport {
        let report = TeardownReport {
            worlds: self.worlds.len(),
            bodies: self.worlds.values().map(|w| w.body_count()).sum(),
        };
        self.worlds.clear();
        self.stats.worlds_destroyed += report.worlds as u64;
        info!(worlds = report.worlds, bodies = report.bodies, "physics torn down");
        report
    }

    fn native(
        &mut self,
        store: &World,
        world_entity: EntityId,
    ) -> Result<&mut Box<dyn PhysicsBackend>, PhysicsError> {
        let world = store
            .get::<PhysicsWorld>(world_entity)
            .ok_or(PhysicsError::NotAPhysicsWorld(world_entity))?;
        let gravity = DVec3::from(world.gravity) * km_to_physics(1.0);
        let kind = self.kind;
        let stats = &mut self.stats;
        let native = self.worlds.entry(world_entity).or_insert_with(|| {
            stats.worlds_created += 1;
            debug!(world = %world_entity, backend = kind.as_str(), "native world created");
            kind.create()
        });
        native.set_gravity(gravity);
        Ok(native)
    }

    fn destroy_world(&mut self, store: &mut World, world_entity: EntityId, world: &PhysicsWorld) {
        if self.worlds.remove(&world_entity).is_some() {
            self.stats.worlds_destroyed += 1;
        }
        for body in world.bodies.keys() {
            if store.has::<PhysicsHandles>(*body) {
                if let Err(e) = store.update::<PhysicsHandles>(*body, |h| {
                    h.handles.remove(&world_entity);
                }) {
                    warn!(body = %body, error = %e, "could not clear handle to destroyed world");
                }
            }
        }
        debug!(world = %world_entity, bodies = world.bodies.len(), "physics world destroyed");
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_ecs::WorldError;
    use helm_math::Coordinates;

    use super::*;

    fn setup(kind: BackendKind) -> (World, PhysicsBridge, EntityId) {
        let mut store = World::with_standard_registry();
        let world = store.spawn([PhysicsWorld::default().into_data()]).unwrap();
        (store, PhysicsBridge::new(kind), world)
    }

    fn body(store: &mut World, x: f64, vx: f64) -> EntityId {
        store
            .spawn([
                Position::at(x, 0.0, 0.0).into_data(),
                Velocity { x: vx, y: 0.0, z: 0.0 }.into_data(),
            ])
            .unwrap()
    }

    #[test]
    fn test_attach_records_both_tables() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 0.0);
        let handle = bridge.attach_body(&mut store, world, ship, None).unwrap();

        assert_eq!(
            store.get::<PhysicsWorld>(world).unwrap().bodies.get(&ship),
            Some(&handle.0)
        );
        assert_eq!(
            store.get::<PhysicsHandles>(ship).unwrap().handles.get(&world),
            Some(&handle.0)
        );
        assert!(bridge.resolves(world, handle));
        assert_eq!(bridge.stats().attached, 1);
        assert_eq!(bridge.stats().worlds_created, 1);
    }

    #[test]
    fn test_attach_errors() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 0.0);
        bridge.attach_body(&mut store, world, ship, None).unwrap();
        assert_eq!(
            bridge.attach_body(&mut store, world, ship, None),
            Err(PhysicsError::AlreadyAttached { world, body: ship })
        );
        assert_eq!(
            bridge.attach_body(&mut store, ship, world, None),
            Err(PhysicsError::NotAPhysicsWorld(ship))
        );
        assert_eq!(
            bridge.attach_body(&mut store, world, EntityId(99), None),
            Err(PhysicsError::World(WorldError::EntityNotFound(EntityId(99))))
        );
        let bad = BodyDesc {
            radius: -1.0,
            ..BodyDesc::default()
        };
        let other = body(&mut store, 0.0, 0.0);
        assert!(bridge.attach_body(&mut store, world, other, Some(bad)).is_err());
        assert_eq!(bridge.body_count(world), 1);
    }

    #[test]
    fn test_detach_releases_handle() {
        let (mut store, mut bridge, world) = setup(BackendKind::Rapier);
        let ship = body(&mut store, 0.0, 0.0);
        let handle = bridge.attach_body(&mut store, world, ship, None).unwrap();
        bridge.detach_body(&mut store, world, ship).unwrap();

        assert!(!bridge.resolves(world, handle));
        assert!(store.get::<PhysicsWorld>(world).unwrap().bodies.is_empty());
        assert!(!store.get::<PhysicsHandles>(ship).unwrap().is_attached());
        assert_eq!(
            bridge.detach_body(&mut store, world, ship),
            Err(PhysicsError::NotAttached { world, body: ship })
        );
    }

    #[test]
    fn test_detach_all_is_one_detach_per_handle() {
        let (mut store, mut bridge, first) = setup(BackendKind::PointMass);
        let second = store.spawn([PhysicsWorld::default().into_data()]).unwrap();
        let ship = body(&mut store, 0.0, 0.0);
        bridge.attach_body(&mut store, first, ship, None).unwrap();
        bridge.attach_body(&mut store, second, ship, None).unwrap();

        assert_eq!(bridge.detach_all(&mut store, ship).unwrap(), 2);
        assert_eq!(bridge.stats().detached, 2);
        assert_eq!(bridge.body_count(first) + bridge.body_count(second), 0);
        assert_eq!(bridge.detach_all(&mut store, ship).unwrap(), 0);
    }

    #[test]
    fn test_release_component_for_world_detaches_bodies() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let a = body(&mut store, 0.0, 0.0);
        let b = body(&mut store, 1.0, 0.0);
        bridge.attach_body(&mut store, world, a, None).unwrap();
        bridge.attach_body(&mut store, world, b, None).unwrap();

        let released = bridge
            .release_component(&mut store, world, ComponentKind::PhysicsWorld)
            .unwrap();
        assert_eq!(released, 2);
        assert_eq!(bridge.world_count(), 0);
        assert!(store.get::<PhysicsHandles>(a).unwrap().handles.is_empty());
        assert_eq!(
            bridge
                .release_component(&mut store, a, ComponentKind::Position)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_step_world_syncs_components() {
        for kind in [BackendKind::PointMass, BackendKind::Rapier] {
            let (mut store, mut bridge, world) = setup(kind);
            let ship = body(&mut store, 10.0, 2.0);
            bridge.attach_body(&mut store, world, ship, None).unwrap();
            assert_eq!(bridge.step_world(&mut store, world, 0.5).unwrap(), 1);
            let x = store.get::<Position>(ship).unwrap().x;
            assert!((x - 11.0).abs() < 1e-6, "{kind}: x = {x}");
        }
    }

    #[test]
    fn test_step_world_picks_up_external_moves() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 1.0);
        bridge.attach_body(&mut store, world, ship, None).unwrap();
        store
            .update::<Position>(ship, |p| p.set_coordinates(Coordinates::new(100.0, 0.0, 0.0)))
            .unwrap();
        bridge.step_world(&mut store, world, 1.0).unwrap();
        assert_eq!(store.get::<Position>(ship).unwrap().x, 101.0);
    }

    #[test]
    fn test_apply_force_changes_velocity() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 0.0);
        bridge.attach_body(&mut store, world, ship, None).unwrap();
        let mass = store.get::<PhysicsHandles>(ship).unwrap().mass;
        assert_eq!(
            bridge
                .apply_force(&store, ship, DVec3::new(mass, 0.0, 0.0))
                .unwrap(),
            1
        );
        bridge.step_world(&mut store, world, 1.0).unwrap();
        assert_eq!(store.get::<Velocity>(ship).unwrap().x, 1.0);
    }

    #[test]
    fn test_removed_attached_body_is_force_released() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 0.0);
        let handle = bridge.attach_body(&mut store, world, ship, None).unwrap();
        store.remove_entity(ship).unwrap();
        let removed = store.flush_removals();

        assert_eq!(bridge.release_removed(&mut store, &removed), 1);
        assert_eq!(bridge.stats().forced_releases, 1);
        assert!(!bridge.resolves(world, handle));
        assert!(store.get::<PhysicsWorld>(world).unwrap().bodies.is_empty());
    }

    #[test]
    fn test_removed_world_clears_body_tables() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        let ship = body(&mut store, 0.0, 0.0);
        bridge.attach_body(&mut store, world, ship, None).unwrap();
        store.remove_entity(world).unwrap();
        let removed = store.flush_removals();

        assert_eq!(bridge.release_removed(&mut store, &removed), 0);
        assert_eq!(bridge.world_count(), 0);
        assert!(!store.get::<PhysicsHandles>(ship).unwrap().is_attached());
    }

    #[test]
    fn test_rebuild_after_restore() {
        let (mut store, mut bridge, world) = setup(BackendKind::Rapier);
        let a = body(&mut store, 1.0, 0.0);
        let b = body(&mut store, 2.0, 0.0);
        bridge.attach_body(&mut store, world, a, None).unwrap();
        bridge.attach_body(&mut store, world, b, None).unwrap();

        let snapshot = store.snapshot().unwrap();
        let mut restored = World::restore(store.registry_arc(), snapshot).unwrap();
        let mut fresh = PhysicsBridge::new(BackendKind::Rapier);
        assert_eq!(fresh.rebuild(&mut restored).unwrap(), 2);

        let table = &restored.get::<PhysicsWorld>(world).unwrap().bodies;
        assert_eq!(table.len(), 2);
        for (body, handle) in table {
            assert!(fresh.resolves(world, BodyHandle(*handle)));
            assert_eq!(
                restored.get::<PhysicsHandles>(*body).unwrap().handles[&world],
                *handle
            );
        }
        let state = fresh
            .body_state(world, BodyHandle(table[&b]))
            .unwrap();
        assert_eq!(state.position.x, 2.0);
    }

    #[test]
    fn test_teardown_reports_everything() {
        let (mut store, mut bridge, world) = setup(BackendKind::PointMass);
        for x in 0..3 {
            let e = body(&mut store, f64::from(x), 0.0);
            bridge.attach_body(&mut store, world, e, None).unwrap();
        }
        let report = bridge.teardown();
        assert_eq!(report, TeardownReport { worlds: 1, bodies: 3 });
        assert_eq!(bridge.world_count(), 0);
    }
}
