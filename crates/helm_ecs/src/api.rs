//! Request shapes for the external query and mutation interfaces.
//!
//! These are the types a network or persistence collaborator hands to a
//! flight. Component names are registry names and payloads are JSON; both
//! are validated here before anything reaches the store.

use std::collections::BTreeMap;

use helm_component::{ComponentKind, EntityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorldError;
use crate::world::World;

/// Read request: components by name, optionally limited to one entity.
///
/// An empty `components` list matches every live entity and returns all of
/// its components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentQuery {
    pub components: Vec<String>,
    pub entity: Option<EntityId>,
}

impl ComponentQuery {
    /// Read the named components of every entity that has them all.
    #[must_use]
    pub fn components<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: names.into_iter().map(Into::into).collect(),
            entity: None,
        }
    }

    /// Limit the query to one entity.
    #[must_use]
    pub fn for_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }
}

/// One entity in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub components: BTreeMap<String, Value>,
}

/// Which entity a mutation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationTarget {
    /// Create a fresh entity and apply the operation to it.
    Create,
    Entity(EntityId),
}

/// What a mutation does. Component names are registry names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MutationOp {
    Add { component: String, data: Value },
    Update { component: String, partial: Value },
    RemoveComponent { component: String },
    RemoveEntity,
}

/// Write request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub target: MutationTarget,
    #[serde(flatten)]
    pub op: MutationOp,
}

impl Mutation {
    /// Create an entity carrying one component.
    pub fn create(component: impl Into<String>, data: Value) -> Self {
        Self {
            target: MutationTarget::Create,
            op: MutationOp::Add {
                component: component.into(),
                data,
            },
        }
    }

    /// Attach a component, replacing any existing value.
    pub fn add(entity: EntityId, component: impl Into<String>, data: Value) -> Self {
        Self {
            target: MutationTarget::Entity(entity),
            op: MutationOp::Add {
                component: component.into(),
                data,
            },
        }
    }

    /// Shallow-merge `partial` into an existing component.
    pub fn update(entity: EntityId, component: impl Into<String>, partial: Value) -> Self {
        Self {
            target: MutationTarget::Entity(entity),
            op: MutationOp::Update {
                component: component.into(),
                partial,
            },
        }
    }

    /// Detach one component.
    pub fn remove_component(entity: EntityId, component: impl Into<String>) -> Self {
        Self {
            target: MutationTarget::Entity(entity),
            op: MutationOp::RemoveComponent {
                component: component.into(),
            },
        }
    }

    /// Remove an entity with everything it carries.
    pub fn remove_entity(entity: EntityId) -> Self {
        Self {
            target: MutationTarget::Entity(entity),
            op: MutationOp::RemoveEntity,
        }
    }
}

/// The entity a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub entity: EntityId,
    pub created: bool,
}

impl World {
    /// Answer a read request with the JSON form of every matching component.
    pub fn run_query(&self, query: &ComponentQuery) -> Result<Vec<EntityView>, WorldError> {
        let kinds = query
            .components
            .iter()
            .map(|name| self.registry().kind_of(name))
            .collect::<Result<Vec<ComponentKind>, _>>()?;

        let ids = match query.entity {
            Some(id) if self.contains(id) => vec![id],
            Some(_) => Vec::new(),
            None => self.all_entities(),
        };

        let mut views = Vec::new();
        for id in ids {
            let Some(entity) = self.get_entity(id) else {
                continue;
            };
            let record = entity.record();
            if !kinds.iter().all(|k| record.has(*k)) {
                continue;
            }
            let mut components = BTreeMap::new();
            for data in record.components() {
                if !kinds.is_empty() && !kinds.contains(&data.kind()) {
                    continue;
                }
                let value = data
                    .to_json()
                    .map_err(|e| WorldError::Snapshot(e.to_string()))?;
                components.insert(data.kind().name().to_string(), value);
            }
            views.push(EntityView { id, components });
        }
        Ok(views)
    }

    /// Apply a validated write. On error nothing changes, including for
    /// `Create`: the payload is validated before the entity is allocated.
    pub fn apply(&mut self, mutation: Mutation) -> Result<MutationOutcome, WorldError> {
        self.check_external_write(mutation.target, &mutation.op)?;
        match (mutation.target, mutation.op) {
            (MutationTarget::Create, MutationOp::Add { component, data }) => {
                let entity = self.spawn_json([(component, data)])?;
                Ok(MutationOutcome {
                    entity,
                    created: true,
                })
            }
            (MutationTarget::Create, op) => Err(WorldError::InvalidMutation(format!(
                "'{}' needs an existing entity",
                op.name()
            ))),
            (MutationTarget::Entity(entity), op) => {
                match op {
                    MutationOp::Add { component, data } => {
                        self.add_component_json(entity, &component, data)?;
                    }
                    MutationOp::Update { component, partial } => {
                        self.update_component_json(entity, &component, partial)?;
                    }
                    MutationOp::RemoveComponent { component } => {
                        self.remove_component_by_name(entity, &component)?;
                    }
                    MutationOp::RemoveEntity => self.remove_entity(entity)?,
                }
                Ok(MutationOutcome {
                    entity,
                    created: false,
                })
            }
        }
    }
}

impl World {
    /// Reject a write that would edit a physics handle table. Those entries
    /// are owned by the physics bridge; a component carrying one may be
    /// created with an empty table, and its other fields updated, but the
    /// table itself only changes through attach and detach.
    pub fn check_external_write(
        &self,
        target: MutationTarget,
        op: &MutationOp,
    ) -> Result<(), WorldError> {
        let (component, payload, replaces) = match op {
            MutationOp::Add { component, data } => (component, data, true),
            MutationOp::Update { component, partial } => (component, partial, false),
            MutationOp::RemoveComponent { .. } | MutationOp::RemoveEntity => return Ok(()),
        };
        // unknown names are reported by the write itself
        let Ok(kind) = self.registry().kind_of(component) else {
            return Ok(());
        };
        let Some(table) = handle_table(kind) else {
            return Ok(());
        };
        let managed = || {
            WorldError::InvalidMutation(format!(
                "'{table}' of '{component}' is managed by the physics bridge"
            ))
        };

        let written = payload.get(table);
        if !replaces && written.is_some() {
            return Err(managed());
        }
        if written.is_some_and(|t| !is_empty_table(t)) {
            return Err(managed());
        }
        if let (true, MutationTarget::Entity(entity)) = (replaces, target) {
            let held = self
                .get_data(entity, kind)
                .and_then(|d| d.to_json().ok())
                .and_then(|v| v.get(table).cloned());
            if held.is_some_and(|t| !is_empty_table(&t)) {
                return Err(managed());
            }
        }
        Ok(())
    }
}

/// Field holding the bridge-owned handle table, for the kinds that have one.
fn handle_table(kind: ComponentKind) -> Option<&'static str> {
    match kind {
        ComponentKind::PhysicsHandles => Some("handles"),
        ComponentKind::PhysicsWorld => Some("bodies"),
        _ => None,
    }
}

fn is_empty_table(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl MutationOp {
    fn name(&self) -> &'static str {
        match self {
            MutationOp::Add { .. } => "add",
            MutationOp::Update { .. } => "update",
            MutationOp::RemoveComponent { .. } => "removeComponent",
            MutationOp::RemoveEntity => "removeEntity",
        }
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_component::schema::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_mutation_wire_shape() {
        let m: Mutation = serde_json::from_value(json!({
            "target": {"entity": 4},
            "op": "update",
            "component": "hull",
            "partial": {"value": 3.0}
        }))
        .unwrap();
        assert_eq!(m, Mutation::update(EntityId(4), "hull", json!({"value": 3.0})));

        let m: Mutation = serde_json::from_value(json!({
            "target": "create",
            "op": "add",
            "component": "position",
            "data": {}
        }))
        .unwrap();
        assert_eq!(m.target, MutationTarget::Create);
    }

    #[test]
    fn test_create_then_update_then_query() {
        let mut w = World::with_standard_registry();
        let out = w
            .apply(Mutation::create("position", json!({"x": 5.0})))
            .unwrap();
        assert!(out.created);
        w.apply(Mutation::add(out.entity, "velocity", json!({"y": 1.0})))
            .unwrap();
        w.apply(Mutation::update(out.entity, "position", json!({"z": 2.0})))
            .unwrap();

        let views = w
            .run_query(&ComponentQuery::components(["position"]))
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].components.len(), 1);
        assert_eq!(views[0].components["position"]["x"], json!(5.0));
        assert_eq!(views[0].components["position"]["z"], json!(2.0));
    }

    #[test]
    fn test_failed_create_allocates_nothing() {
        let mut w = World::with_standard_registry();
        let err = w
            .apply(Mutation::create("hull", json!({"value": -3.0})))
            .unwrap_err();
        assert!(matches!(err, WorldError::Validation(_)));
        assert_eq!(w.entity_count(), 0);
        assert!(w.apply(Mutation {
            target: MutationTarget::Create,
            op: MutationOp::RemoveEntity,
        })
        .is_err());
    }

    #[test]
    fn test_query_entity_filter_and_unknown_names() {
        let mut w = World::with_standard_registry();
        let a = w.spawn([Hull::default().into_data()]).unwrap();
        w.spawn([Hull::default().into_data()]).unwrap();

        let views = w
            .run_query(&ComponentQuery::components(["hull"]).for_entity(a))
            .unwrap();
        assert_eq!(views.iter().map(|v| v.id).collect::<Vec<_>>(), vec![a]);

        assert!(w
            .run_query(&ComponentQuery::components(["hull"]).for_entity(EntityId(77)))
            .unwrap()
            .is_empty());
        assert_eq!(
            w.run_query(&ComponentQuery::components(["warpCore"])),
            Err(WorldError::UnknownComponentType("warpCore".into()))
        );
    }

    #[test]
    fn test_remove_entity_mutation() {
        let mut w = World::with_standard_registry();
        let a = w.spawn([Hull::default().into_data()]).unwrap();
        w.apply(Mutation::remove_entity(a)).unwrap();
        assert!(w.get_entity(a).is_none());
        assert_eq!(
            w.apply(Mutation::remove_entity(a)),
            Err(WorldError::EntityNotFound(a))
        );
    }

    #[test]
    fn test_handle_tables_reject_outside_writes() {
        let mut w = World::with_standard_registry();
        let space = w
            .apply(Mutation::create("physicsWorld", json!({})))
            .unwrap()
            .entity;
        let ship = w
            .apply(Mutation::create("physicsHandles", json!({"radius": 2.0})))
            .unwrap()
            .entity;
        w.update::<PhysicsHandles>(ship, |h| {
            h.handles.insert(space, 7);
        })
        .unwrap();

        let err = w
            .apply(Mutation::update(ship, "physicsHandles", json!({"handles": {}})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalidMutation");
        let err = w
            .apply(Mutation::add(ship, "physicsHandles", json!({})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalidMutation");
        let err = w
            .apply(Mutation::create("physicsWorld", json!({"bodies": {"3": 9}})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalidMutation");
        assert_eq!(w.get::<PhysicsHandles>(ship).unwrap().handles.len(), 1);

        // fields outside the table stay writable
        w.apply(Mutation::update(ship, "physicsHandles", json!({"mass": 5.0})))
            .unwrap();
        w.apply(Mutation::update(
            space,
            "physicsWorld",
            json!({"gravity": {"x": 0.0, "y": -1.0, "z": 0.0}}),
        ))
        .unwrap();
        assert_eq!(w.get::<PhysicsHandles>(ship).unwrap().mass, 5.0);
    }
}
