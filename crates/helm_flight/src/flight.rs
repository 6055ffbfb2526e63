//! One isolated simulation instance.
//!
//! A [`Flight`] owns its entity store, scheduler, physics bridge and
//! notification hub; nothing is shared between flights. All mutation goes
//! through `&mut self`, so a flight has exactly one writer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use helm_component::ComponentRegistry;
use helm_ecs::{
    ComponentQuery, EntityView, Mutation, MutationOp, MutationOutcome, MutationTarget, World,
    WorldError, WorldSnapshot,
};
use helm_notify::{ChangeSet, Filter, NotificationHub, Subscription, SubscriptionId};
use helm_physics::{BackendKind, PhysicsBridge, TeardownReport};
use helm_system::{Scheduler, System, TickReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FlightConfig;
use crate::error::FlightError;

/// Identifies a running flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightId(Uuid);

impl FlightId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlightId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for FlightId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Persistable form of a flight: the whole store plus the tick counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSnapshot {
    pub name: String,
    pub tick: u64,
    pub physics: BackendKind,
    pub world: WorldSnapshot,
}

impl FlightSnapshot {
    /// Encode as MessagePack.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, FlightError> {
        rmp_serde::to_vec_named(self).map_err(|e| WorldError::Snapshot(e.to_string()).into())
    }

    /// Decode from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, FlightError> {
        rmp_serde::from_slice(bytes).map_err(|e| WorldError::Snapshot(e.to_string()).into())
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, FlightError> {
        serde_json::to_value(self).map_err(|e| WorldError::Snapshot(e.to_string()).into())
    }

    /// Decode from JSON.
    pub fn from_json(value: serde_json::Value) -> Result<Self, FlightError> {
        serde_json::from_value(value).map_err(|e| WorldError::Snapshot(e.to_string()).into())
    }
}

/// One simulation: store, scheduler, physics bridge and notification hub.
pub struct Flight {
    config: FlightConfig,
    world: World,
    scheduler: Scheduler,
    physics: PhysicsBridge,
    hub: Arc<NotificationHub>,
}

impl Flight {
    /// An empty flight running every built-in system.
    pub fn new(config: FlightConfig, registry: Arc<ComponentRegistry>) -> Result<Self, FlightError> {
        config.tick.validate()?;
        let scheduler = Scheduler::standard(&registry)?;
        let physics = PhysicsBridge::new(config.physics);
        info!(
            flight = %config.name,
            physics = %config.physics,
            tick_rate = config.tick.tick_rate,
            systems = scheduler.names().len(),
            "flight created"
        );
        Ok(Self {
            world: World::new(registry),
            scheduler,
            physics,
            hub: Arc::new(NotificationHub::new()),
            config,
        })
    }

    /// Rebuild a flight from a snapshot. Every component is re-validated and
    /// every native physics world is rebuilt with fresh handles.
    pub fn restore(
        config: FlightConfig,
        registry: Arc<ComponentRegistry>,
        snapshot: FlightSnapshot,
    ) -> Result<Self, FlightError> {
        let mut flight = Self::new(config, Arc::clone(&registry))?;
        flight.world = World::restore(registry, snapshot.world)?;
        flight.physics.rebuild(&mut flight.world)?;
        flight.world.take_changes();
        flight.scheduler.set_tick_count(snapshot.tick);
        info!(
            flight = %flight.config.name,
            tick_id = snapshot.tick,
            entities = flight.world.entity_count(),
            "flight restored"
        );
        Ok(flight)
    }

    /// Append a system after the built-in ones.
    pub fn register_system(&mut self, system: Box<dyn System>) -> Result<(), FlightError> {
        self.scheduler.register(self.world.registry(), system)?;
        Ok(())
    }

    /// The configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration the flight was built with.
    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    /// The entity store.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct store access for spawners setting up a flight. Changes made
    /// here are tracked and notified like any other.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The physics bridge.
    pub fn physics(&self) -> &PhysicsBridge {
        &self.physics
    }

    /// The store and the bridge together, for attaching bodies.
    pub fn parts_mut(&mut self) -> (&mut World, &mut PhysicsBridge) {
        (&mut self.world, &mut self.physics)
    }

    /// The notification hub.
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Run every system once, advancing simulated time by exactly
    /// `elapsed`, without notifying.
    pub fn advance(&mut self, elapsed: Duration) -> TickReport {
        self.scheduler
            .run_tick(&mut self.world, &mut self.physics, elapsed)
    }

    /// Everything that changed since the last call, including external
    /// mutations made between ticks.
    pub fn take_change_set(&mut self) -> Result<ChangeSet, FlightError> {
        let changes = self.world.take_changes();
        Ok(ChangeSet::capture(&self.world, self.tick_count(), &changes)?)
    }

    /// Advance one tick and deliver its change set to subscribers.
    pub fn tick(&mut self, elapsed: Duration) -> Result<TickReport, FlightError> {
        let report = self.advance(elapsed);
        let set = self.take_change_set()?;
        let delivery = self.hub.dispatch(&set);
        debug!(
            flight = %self.config.name,
            tick_id = report.tick,
            changes = set.len(),
            delivered = delivery.delivered,
            "tick complete"
        );
        Ok(report)
    }

    /// Answer a read request.
    pub fn query(&self, query: &ComponentQuery) -> Result<Vec<EntityView>, FlightError> {
        Ok(self.world.run_query(query)?)
    }

    /// Apply one external write. Removals release physics handles before
    /// the store is touched; on error the flight is unchanged.
    pub fn mutate(&mut self, mutation: Mutation) -> Result<MutationOutcome, FlightError> {
        if let MutationTarget::Entity(entity) = mutation.target {
            match &mutation.op {
                MutationOp::RemoveEntity if self.world.contains(entity) => {
                    self.physics.detach_all(&mut self.world, entity)?;
                }
                MutationOp::RemoveComponent { component } => {
                    let kind = self.world.registry().kind_of(component)?;
                    if self.world.has_kind(entity, kind) {
                        self.physics
                            .release_component(&mut self.world, entity, kind)?;
                    }
                }
                _ => {}
            }
        }
        Ok(self.world.apply(mutation)?)
    }

    /// Register a callback run after every tick with changes it accepts.
    pub fn subscribe(
        &self,
        filter: Filter,
        callback: impl Fn(&ChangeSet) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.hub.subscribe(filter, callback)
    }

    /// Register a mailbox fed after every tick.
    pub fn subscribe_channel(&self, filter: Filter) -> Subscription {
        self.hub.subscribe_channel(filter)
    }

    /// Drop a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Capture the store and tick count.
    pub fn snapshot(&self) -> Result<FlightSnapshot, FlightError> {
        Ok(FlightSnapshot {
            name: self.config.name.clone(),
            tick: self.tick_count(),
            physics: self.config.physics,
            world: self.world.snapshot()?,
        })
    }

    /// End the flight: close every subscription, release every native
    /// world and body, and discard the store.
    pub fn teardown(mut self) -> TeardownReport {
        self.hub.close();
        let report = self.physics.teardown();
        info!(
            flight = %self.config.name,
            tick_id = self.tick_count(),
            entities = self.world.entity_count(),
            worlds = report.worlds,
            bodies = report.bodies,
            "flight torn down"
        );
        report
    }
}
