//! The entity store: every entity of one flight and its components.
//!
//! Components are held as [`ComponentData`] keyed by [`ComponentKind`], so
//! lookups are closed over the kinds known at compile time while the
//! registry still decides which kinds a flight accepts. Every write goes
//! through validation first and only commits on success; a rejected
//! mutation leaves the store exactly as it was.
//!
//! Entities live in a `BTreeMap`, so iteration is always in ascending id
//! order and two runs over the same inputs visit entities identically.
//!
//! A removed entity is hidden from every lookup at once, so reads after
//! [`World::remove_entity`] see nothing and later systems in the same tick
//! (waypoint arrival, for one) already observe the removal. Its row is only
//! dropped at the tick boundary, when the physics bridge has had its chance
//! to release what the entity held.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use helm_component::schema::{IsTimelineStep, IsTrigger, TimelineAction, TriggerCondition};
use helm_component::{
    Component, ComponentData, ComponentKind, ComponentRegistry, EntityAllocator, EntityId,
};
use serde_json::Value;
use tracing::debug;

use crate::change::{Change, ChangeKind, ChangeTracker};
use crate::error::WorldError;
use crate::query::Query;

/// A single entity's component set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    components: BTreeMap<ComponentKind, ComponentData>,
}

impl EntityRecord {
    /// The component of type `T`, if present.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components.get(&T::KIND).and_then(T::from_data)
    }

    /// The component of `kind`, if present.
    #[must_use]
    pub fn get_data(&self, kind: ComponentKind) -> Option<&ComponentData> {
        self.components.get(&kind)
    }

    /// Returns `true` if the record carries `kind`.
    #[must_use]
    pub fn has(&self, kind: ComponentKind) -> bool {
        self.components.contains_key(&kind)
    }

    /// Component kinds on this entity, in kind order.
    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components.keys().copied()
    }

    /// Every component, in kind order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentData> {
        self.components.values()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the record carries no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// A borrowed view of one live entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'w> {
    pub id: EntityId,
    record: &'w EntityRecord,
}

impl<'w> EntityRef<'w> {
    /// The component of type `T`, if present.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.record.get::<T>()
    }

    /// Returns `true` if the entity carries `kind`.
    #[must_use]
    pub fn has(&self, kind: ComponentKind) -> bool {
        self.record.has(kind)
    }

    /// The underlying component record.
    #[must_use]
    pub fn record(&self) -> &'w EntityRecord {
        self.record
    }
}

/// An entity dropped at a tick boundary, with the components it held.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEntity {
    pub id: EntityId,
    pub record: EntityRecord,
}

/// The ECS world: entity storage and validated component operations.
#[derive(Debug, Clone)]
pub struct World {
    registry: Arc<ComponentRegistry>,
    allocator: EntityAllocator,
    entities: BTreeMap<EntityId, EntityRecord>,
    /// Removed but not yet flushed. Hidden from every lookup.
    pending_removal: BTreeSet<EntityId>,
    changes: ChangeTracker,
}

impl World {
    /// An empty world accepting the component types in `registry`.
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            allocator: EntityAllocator::new(),
            entities: BTreeMap::new(),
            pending_removal: BTreeSet::new(),
            changes: ChangeTracker::default(),
        }
    }

    /// A world accepting every built-in component type.
    pub fn with_standard_registry() -> Self {
        Self::new(Arc::new(ComponentRegistry::standard()))
    }

    /// The component types this world accepts.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// A shared handle to the registry.
    pub fn registry_arc(&self) -> Arc<ComponentRegistry> {
        Arc::clone(&self.registry)
    }

    /// The id the next created entity will receive.
    pub fn next_entity_id(&self) -> u64 {
        self.allocator.next_id()
    }

    // -- Entity lifecycle --

    /// Allocate a fresh entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.insert(id, EntityRecord::default());
        self.changes.entity_created(id);
        debug!(entity = %id, "entity created");
        id
    }

    /// Create an entity carrying `components`. Every component is checked
    /// before the entity is allocated, so a failure creates nothing.
    pub fn spawn(
        &mut self,
        components: impl IntoIterator<Item = ComponentData>,
    ) -> Result<EntityId, WorldError> {
        let components: Vec<ComponentData> = components.into_iter().collect();
        for data in &components {
            self.check_data(data)?;
        }
        let id = self.create_entity();
        for data in components {
            self.insert_unchecked(id, data);
        }
        Ok(id)
    }

    /// Create an entity from `{name: payload}` pairs, validating all of them
    /// first.
    pub fn spawn_json(
        &mut self,
        components: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<EntityId, WorldError> {
        let mut validated = Vec::new();
        for (name, value) in components {
            validated.push(self.registry.validate(&name, value)?);
        }
        self.spawn(validated)
    }

    /// Mark an entity for removal. It disappears from every lookup at once;
    /// its row is dropped by [`World::flush_removals`] at the tick boundary.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        if !self.contains(id) {
            return Err(WorldError::EntityNotFound(id));
        }
        self.pending_removal.insert(id);
        self.changes.entity_removed(id);
        debug!(entity = %id, "entity marked for removal");
        Ok(())
    }

    /// Entities removed since the last flush, in ascending id order.
    pub fn pending_removals(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.pending_removal.iter().copied()
    }

    /// Components still held by an entity pending removal.
    pub fn pending_record(&self, id: EntityId) -> Option<&EntityRecord> {
        if self.pending_removal.contains(&id) {
            self.entities.get(&id)
        } else {
            None
        }
    }

    /// Drop every entity marked for removal and hand back what they held.
    pub fn flush_removals(&mut self) -> Vec<RemovedEntity> {
        let pending = std::mem::take(&mut self.pending_removal);
        pending
            .into_iter()
            .filter_map(|id| {
                self.entities
                    .remove(&id)
                    .map(|record| RemovedEntity { id, record })
            })
            .collect()
    }

    /// Is `id` a live entity?
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id) && !self.pending_removal.contains(&id)
    }

    /// Count of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len() - self.pending_removal.len()
    }

    /// All live entity ids in ascending order.
    pub fn all_entities(&self) -> Vec<EntityId> {
        self.live().map(|(id, _)| *id).collect()
    }

    /// A read view of a live entity.
    pub fn get_entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.record(id).map(|record| EntityRef { id, record })
    }

    /// Registry names of the components on `id`.
    pub fn components_of(&self, id: EntityId) -> Result<Vec<&'static str>, WorldError> {
        let record = self.record(id).ok_or(WorldError::EntityNotFound(id))?;
        Ok(record.kinds().map(ComponentKind::name).collect())
    }

    // -- Component operations --

    /// Attach a component, replacing any existing value of the same kind.
    pub fn add<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), WorldError> {
        self.add_data(id, value.into_data())
    }

    /// Attach a type-erased component, replacing any existing value.
    pub fn add_data(&mut self, id: EntityId, data: ComponentData) -> Result<(), WorldError> {
        self.check_data(&data)?;
        if !self.contains(id) {
            return Err(WorldError::EntityNotFound(id));
        }
        self.insert_unchecked(id, data);
        Ok(())
    }

    /// Attach a component from a JSON payload, merged with the type's defaults.
    pub fn add_component_json(
        &mut self,
        id: EntityId,
        name: &str,
        data: Value,
    ) -> Result<(), WorldError> {
        let data = self.registry.validate(name, data)?;
        self.add_data(id, data)
    }

    /// Typed partial update. `f` edits a copy; the copy is validated and
    /// only then replaces the stored value.
    pub fn update<T: Component>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut T),
    ) -> Result<(), WorldError> {
        let mut next = self
            .get::<T>(id)
            .cloned()
            .ok_or_else(|| self.missing(id, T::KIND))?;
        f(&mut next);
        next.check()?;
        let next = next.into_data();
        self.check_references(&next)?;
        self.commit_update(id, next);
        Ok(())
    }

    /// Shallow-merge a JSON object into an existing component. Keys in
    /// `partial` replace the component's top-level fields; all other fields
    /// keep their current values.
    pub fn update_component_json(
        &mut self,
        id: EntityId,
        name: &str,
        partial: Value,
    ) -> Result<(), WorldError> {
        let kind = self.registry.kind_of(name)?;
        let current = self
            .record(id)
            .and_then(|r| r.get_data(kind))
            .ok_or_else(|| self.missing(id, kind))?;
        let patch = match partial {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(
                    helm_component::ValidationError::new(name, "partial update must be an object")
                        .into(),
                );
            }
        };
        let mut merged = match current.to_json() {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(helm_component::ValidationError::new(name, e.to_string()).into()),
        };
        for (field, value) in patch {
            merged.insert(field, value);
        }
        let next = ComponentData::from_json(kind, Value::Object(merged))?;
        self.check_references(&next)?;
        self.commit_update(id, next);
        Ok(())
    }

    /// The component of type `T` on `id`, if both exist.
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.record(id).and_then(EntityRecord::get::<T>)
    }

    /// The component of `kind` on `id`, if both exist.
    pub fn get_data(&self, id: EntityId, kind: ComponentKind) -> Option<&ComponentData> {
        self.record(id).and_then(|r| r.get_data(kind))
    }

    /// A component's JSON form.
    pub fn get_component_json(&self, id: EntityId, name: &str) -> Result<Value, WorldError> {
        let kind = self.registry.kind_of(name)?;
        let data = self
            .get_data(id, kind)
            .ok_or_else(|| self.missing(id, kind))?;
        data.to_json()
            .map_err(|e| helm_component::ValidationError::new(name, e.to_string()).into())
    }

    /// Returns `true` if `id` is live and carries `T`.
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.has_kind(id, T::KIND)
    }

    /// Returns `true` if `id` is live and carries `kind`.
    pub fn has_kind(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.record(id).is_some_and(|r| r.has(kind))
    }

    /// Detach a component, returning its last value.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        kind: ComponentKind,
    ) -> Result<ComponentData, WorldError> {
        if !self.contains(id) {
            return Err(WorldError::EntityNotFound(id));
        }
        let removed = self
            .entities
            .get_mut(&id)
            .and_then(|r| r.components.remove(&kind))
            .ok_or(WorldError::ComponentNotPresent {
                entity: id,
                component: kind,
            })?;
        self.changes
            .component(id, kind, ChangeKind::ComponentRemoved);
        Ok(removed)
    }

    /// Detach a component named by its registry name.
    pub fn remove_component_by_name(
        &mut self,
        id: EntityId,
        name: &str,
    ) -> Result<ComponentData, WorldError> {
        let kind = self.registry.kind_of(name)?;
        self.remove_component(id, kind)
    }

    // -- Queries --

    /// Lazily iterate live entities matching `query`, in ascending id order.
    /// The shared borrow keeps membership stable for the whole pass, and the
    /// iterator can be recreated to restart.
    pub fn query<'w>(&'w self, query: &'w Query) -> impl Iterator<Item = EntityRef<'w>> + 'w {
        self.live()
            .filter(move |(id, record)| query.matches(**id, record, &self.changes))
            .map(|(id, record)| EntityRef { id: *id, record })
    }

    /// Snapshot of the ids matching `query`, for passes that mutate the store
    /// while walking the result.
    pub fn query_ids(&self, query: &Query) -> Vec<EntityId> {
        self.query(query).map(|e| e.id).collect()
    }

    /// Live entities satisfying an arbitrary predicate.
    pub fn query_with<'w, F>(&'w self, mut predicate: F) -> impl Iterator<Item = EntityRef<'w>> + 'w
    where
        F: FnMut(EntityRef<'w>) -> bool + 'w,
    {
        self.live()
            .map(|(id, record)| EntityRef { id: *id, record })
            .filter(move |e| predicate(*e))
    }

    // -- Change tracking --

    /// Net changes since the last call to [`World::take_changes`].
    pub fn changes(&self) -> Vec<Change> {
        self.changes.changes()
    }

    /// Drain the net changes recorded since the last drain.
    pub fn take_changes(&mut self) -> Vec<Change> {
        self.changes.take()
    }

    /// Has anything changed since the last drain?
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    // -- Internals --

    fn live(&self) -> impl Iterator<Item = (&EntityId, &EntityRecord)> {
        self.entities
            .iter()
            .filter(|(id, _)| !self.pending_removal.contains(id))
    }

    fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        if self.pending_removal.contains(&id) {
            return None;
        }
        self.entities.get(&id)
    }

    fn missing(&self, id: EntityId, kind: ComponentKind) -> WorldError {
        if self.contains(id) {
            WorldError::ComponentNotPresent {
                entity: id,
                component: kind,
            }
        } else {
            WorldError::EntityNotFound(id)
        }
    }

    fn check_data(&self, data: &ComponentData) -> Result<(), WorldError> {
        let kind = data.kind();
        if !self.registry.is_registered(kind) {
            return Err(WorldError::UnknownComponentType(kind.name().to_string()));
        }
        data.validate()?;
        self.check_references(data)
    }

    /// Triggers and timeline steps name components by string; each name
    /// must resolve in this world's registry before the node is stored.
    pub(crate) fn check_references(&self, data: &ComponentData) -> Result<(), WorldError> {
        let (conditions, actions) = if let Some(trigger) = IsTrigger::from_data(data) {
            (&trigger.conditions, &trigger.actions)
        } else if let Some(step) = IsTimelineStep::from_data(data) {
            (&step.conditions, &step.actions)
        } else {
            return Ok(());
        };
        let names = conditions
            .iter()
            .filter_map(TriggerCondition::component)
            .chain(actions.iter().flat_map(TimelineAction::components));
        for name in names {
            self.registry.kind_of(name)?;
        }
        Ok(())
    }

    fn insert_unchecked(&mut self, id: EntityId, data: ComponentData) {
        let kind = data.kind();
        if let Some(record) = self.entities.get_mut(&id) {
            let change = if record.components.insert(kind, data).is_some() {
                ChangeKind::ComponentUpdated
            } else {
                ChangeKind::ComponentAdded
            };
            self.changes.component(id, kind, change);
        }
    }

    fn commit_update(&mut self, id: EntityId, data: ComponentData) {
        let kind = data.kind();
        if let Some(record) = self.entities.get_mut(&id) {
            record.components.insert(kind, data);
            self.changes
                .component(id, kind, ChangeKind::ComponentUpdated);
        }
    }

    /// Insert a restored entity under its original id.
    pub(crate) fn restore_entity(&mut self, id: EntityId, components: Vec<ComponentData>) {
        self.allocator.reserve(id);
        let record = EntityRecord {
            components: components.into_iter().map(|c| (c.kind(), c)).collect(),
        };
        self.entities.insert(id, record);
    }

    pub(crate) fn resume_allocator(&mut self, next_id: u64) {
        self.allocator = EntityAllocator::resume_from(next_id);
    }

    pub(crate) fn live_records(&self) -> impl Iterator<Item = (&EntityId, &EntityRecord)> {
        self.live()
    }
}
