//! System scheduler: runs registered systems in order, once per tick.
//!
//! Systems execute in registration order; each completes its whole pass
//! before the next one starts. Within a pass entities are visited in
//! ascending id order, so a tick is fully deterministic given its inputs.
//!
//! A failing update (error or panic) is isolated to its entity: the fault is
//! logged, the entity is skipped by every later system of the tick, and the
//! tick carries on. Entity removals are flushed once all systems have run,
//! and any physics handles still held by a removed entity are reclaimed
//! then.

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use helm_component::{ComponentKind, ComponentRegistry, EntityId, RegistryError};
use helm_ecs::World;
use helm_physics::PhysicsBridge;
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::default_systems;

/// One isolated per-entity failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemFault {
    pub system: &'static str,
    pub entity: EntityId,
    pub error: String,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub elapsed_ms: f64,
    /// Successful per-entity updates across all systems.
    pub updates: usize,
    pub faults: Vec<SystemFault>,
    /// Entities flushed from the store at the end of the tick.
    pub removed: Vec<EntityId>,
    /// Physics handles reclaimed from removed entities that still held them.
    pub forced_releases: usize,
}

/// Runs registered systems in order, once per tick.
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
    tick: u64,
}

impl Scheduler {
    /// A scheduler with no systems.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler carrying every built-in system in deployment order.
    pub fn standard(registry: &ComponentRegistry) -> Result<Self, RegistryError> {
        let mut scheduler = Self::new();
        for system in default_systems() {
            scheduler.register(registry, system)?;
        }
        Ok(scheduler)
    }

    /// Append a system. Every component kind it refers to must be registered,
    /// so a misconfigured deployment fails here and not mid-tick.
    pub fn register(
        &mut self,
        registry: &ComponentRegistry,
        system: Box<dyn System>,
    ) -> Result<(), RegistryError> {
        let query = system.query();
        let kinds: Vec<ComponentKind> = query
            .with
            .iter()
            .chain(&query.without)
            .chain(&query.changed)
            .chain(system.uses())
            .copied()
            .collect();
        registry.require(system.name(), &kinds)?;
        debug!(system = system.name(), "system registered");
        self.systems.push(system);
        Ok(())
    }

    /// System names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Resume numbering after a restore.
    pub fn set_tick_count(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Run every system once, then flush removals.
    pub fn run_tick(
        &mut self,
        world: &mut World,
        physics: &mut PhysicsBridge,
        elapsed: Duration,
    ) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            elapsed_ms: helm_math::units::millis(elapsed),
            ..TickReport::default()
        };
        let mut faulted: BTreeSet<EntityId> = BTreeSet::new();

        for system in &mut self.systems {
            let query = system.query();
            let matched: Vec<EntityId> = world
                .query(&query)
                .filter(|e| system.matches(*e))
                .map(|e| e.id)
                .collect();
            trace!(tick_id = self.tick, system = system.name(), matched = matched.len(), "system pass");

            let mut ctx = SystemContext {
                world: &mut *world,
                physics: &mut *physics,
                tick: self.tick,
                elapsed,
            };
            for entity in matched {
                if faulted.contains(&entity) || !ctx.world.contains(entity) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| system.update(&mut ctx, entity)))
                    .unwrap_or_else(|panic| Err(SystemError::Panicked(panic_message(&*panic))));
                match outcome {
                    Ok(()) => report.updates += 1,
                    Err(e) => {
                        error!(
                            tick_id = self.tick,
                            entity = %entity,
                            system = system.name(),
                            error = %e,
                            "system update failed; skipping entity for the rest of the tick"
                        );
                        faulted.insert(entity);
                        report.faults.push(SystemFault {
                            system: system.name(),
                            entity,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        let removed = world.flush_removals();
        report.forced_releases = physics.release_removed(world, &removed);
        report.removed = removed.into_iter().map(|r| r.id).collect();
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use helm_component::Component;
    use helm_component::schema::*;
    use helm_ecs::Query;
    use helm_physics::BackendKind;

    use super::*;

    type Log = Arc<Mutex<Vec<(&'static str, EntityId)>>>;

    /// Records every call; fails once or panics for chosen entities.
    struct Recorder {
        name: &'static str,
        log: Log,
        fail: Option<EntityId>,
        panic: Option<EntityId>,
        remove: Option<EntityId>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail: None,
                panic: None,
                remove: None,
            }
        }
    }

    impl System for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn query(&self) -> Query {
            Query::all_of(&[ComponentKind::Hull])
        }

        fn update(
            &mut self,
            ctx: &mut SystemContext<'_>,
            entity: EntityId,
        ) -> Result<(), SystemError> {
            self.log.lock().unwrap().push((self.name, entity));
            if self.panic == Some(entity) {
                panic!("recorder exploded");
            }
            if self.fail == Some(entity) {
                self.fail = None;
                return Err(SystemError::Invariant("injected failure".into()));
            }
            if let Some(victim) = self.remove {
                if ctx.world.contains(victim) {
                    ctx.world.remove_entity(victim)?;
                }
            }
            Ok(())
        }
    }

    fn fixture(n: usize) -> (World, PhysicsBridge, Vec<EntityId>) {
        let mut world = World::with_standard_registry();
        let ids = (0..n)
            .map(|_| world.spawn([Hull::default().into_data()]).unwrap())
            .collect();
        (world, PhysicsBridge::new(BackendKind::PointMass), ids)
    }

    #[test]
    fn test_systems_run_in_registration_order() {
        let (mut world, mut physics, ids) = fixture(2);
        let log = Log::default();
        let mut s = Scheduler::new();
        s.register(world.registry(), Box::new(Recorder::new("a", &log))).unwrap();
        s.register(world.registry(), Box::new(Recorder::new("b", &log))).unwrap();
        assert_eq!(s.names(), vec!["a", "b"]);

        let report = s.run_tick(&mut world, &mut physics, Duration::from_millis(16));
        assert_eq!(report.tick, 1);
        assert_eq!(report.updates, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("a", ids[0]), ("a", ids[1]), ("b", ids[0]), ("b", ids[1])]
        );
    }

    #[test]
    fn test_fault_skips_entity_for_rest_of_tick() {
        let (mut world, mut physics, ids) = fixture(3);
        let log = Log::default();
        let mut first = Recorder::new("first", &log);
        first.fail = Some(ids[1]);
        let mut s = Scheduler::new();
        s.register(world.registry(), Box::new(first)).unwrap();
        s.register(world.registry(), Box::new(Recorder::new("second", &log))).unwrap();

        let report = s.run_tick(&mut world, &mut physics, Duration::from_millis(16));
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].entity, ids[1]);
        assert_eq!(report.faults[0].system, "first");
        let calls = log.lock().unwrap().clone();
        assert!(!calls.contains(&("second", ids[1])));
        assert!(calls.contains(&("second", ids[0])));
        assert!(calls.contains(&("second", ids[2])));

        // the next tick starts clean
        log.lock().unwrap().clear();
        s.run_tick(&mut world, &mut physics, Duration::from_millis(16));
        assert!(log.lock().unwrap().contains(&("second", ids[1])));
    }

    #[test]
    fn test_panic_is_isolated() {
        let (mut world, mut physics, ids) = fixture(2);
        let log = Log::default();
        let mut recorder = Recorder::new("boom", &log);
        recorder.panic = Some(ids[0]);
        let mut s = Scheduler::new();
        s.register(world.registry(), Box::new(recorder)).unwrap();

        let report = s.run_tick(&mut world, &mut physics, Duration::from_millis(16));
        assert_eq!(report.updates, 1);
        assert_eq!(
            report.faults[0].error,
            SystemError::Panicked("recorder exploded".into()).to_string()
        );
    }

    #[test]
    fn test_removed_mid_pass_is_skipped_and_flushed() {
        let (mut world, mut physics, ids) = fixture(3);
        let log = Log::default();
        let mut recorder = Recorder::new("reaper", &log);
        recorder.remove = Some(ids[2]);
        let mut s = Scheduler::new();
        s.register(world.registry(), Box::new(recorder)).unwrap();

        let report = s.run_tick(&mut world, &mut physics, Duration::from_millis(16));
        assert!(!log.lock().unwrap().contains(&("reaper", ids[2])));
        assert_eq!(report.removed, vec![ids[2]]);
        assert!(world.get_entity(ids[2]).is_none());
        assert_eq!(world.pending_removals().count(), 0);
    }

    #[test]
    fn test_register_rejects_unregistered_kinds() {
        let mut registry = ComponentRegistry::new();
        registry.define::<Position>().unwrap();
        let log = Log::default();
        let mut s = Scheduler::new();
        let err = s
            .register(&registry, Box::new(Recorder::new("needs-hull", &log)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingComponent { .. }));
        assert!(s.names().is_empty());
    }

    #[test]
    fn test_standard_order() {
        let s = Scheduler::standard(&ComponentRegistry::standard()).unwrap();
        assert_eq!(
            s.names(),
            vec![
                "autopilot",
                "physics_world",
                "position_velocity",
                "rotation_velocity",
                "torpedo_launcher",
                "torpedo",
                "hull_breach",
                "is_destroyed",
                "waypoint",
                "trigger",
                "timeline",
            ]
        );
    }
}
