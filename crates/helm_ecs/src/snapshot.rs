//! Whole-store snapshots.
//!
//! A snapshot carries every live entity with its components in their JSON
//! form, plus the allocator cursor, so a restored flight keeps its ids and
//! never hands out an id that already existed. Change tracking state is not
//! part of a snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use helm_component::{ComponentRegistry, EntityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::WorldError;
use crate::world::World;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Every live entity and the allocator position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub version: u32,
    pub next_entity_id: u64,
    pub entities: Vec<EntitySnapshot>,
}

/// One entity's components in their JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    /// component name -> JSON payload
    pub components: BTreeMap<String, Value>,
}

impl WorldSnapshot {
    /// Encode as MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, WorldError> {
        rmp_serde::to_vec_named(self).map_err(|e| WorldError::Snapshot(e.to_string()))
    }

    /// Decode from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, WorldError> {
        rmp_serde::from_slice(bytes).map_err(|e| WorldError::Snapshot(e.to_string()))
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Value, WorldError> {
        serde_json::to_value(self).map_err(|e| WorldError::Snapshot(e.to_string()))
    }

    /// Decode from JSON.
    pub fn from_json(value: Value) -> Result<Self, WorldError> {
        serde_json::from_value(value).map_err(|e| WorldError::Snapshot(e.to_string()))
    }
}

impl World {
    /// Serialise every live entity.
    pub fn snapshot(&self) -> Result<WorldSnapshot, WorldError> {
        let mut entities = Vec::with_capacity(self.entity_count());
        for (id, record) in self.live_records() {
            let mut components = BTreeMap::new();
            for data in record.components() {
                let value = data
                    .to_json()
                    .map_err(|e| WorldError::Snapshot(format!("{id}: {e}")))?;
                components.insert(data.kind().name().to_string(), value);
            }
            entities.push(EntitySnapshot {
                id: *id,
                components,
            });
        }
        Ok(WorldSnapshot {
            version: SNAPSHOT_VERSION,
            next_entity_id: self.next_entity_id(),
            entities,
        })
    }

    /// Rebuild a world from a snapshot, re-validating every component
    /// against `registry`. Fails without producing a partial world.
    pub fn restore(
        registry: Arc<ComponentRegistry>,
        snapshot: WorldSnapshot,
    ) -> Result<World, WorldError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(WorldError::Snapshot(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        let mut world = World::new(registry);
        world.resume_allocator(snapshot.next_entity_id);
        let count = snapshot.entities.len();
        for entity in snapshot.entities {
            if !entity.id.is_valid() {
                return Err(WorldError::Snapshot("entity id 0 is reserved".into()));
            }
            if world.contains(entity.id) {
                return Err(WorldError::Snapshot(format!(
                    "duplicate entity {}",
                    entity.id
                )));
            }
            let mut components = Vec::with_capacity(entity.components.len());
            for (name, value) in entity.components {
                let data = world.registry().validate(&name, value)?;
                world.check_references(&data)?;
                components.push(data);
            }
            world.restore_entity(entity.id, components);
        }
        info!(entities = count, next_entity_id = world.next_entity_id(), "world restored");
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use helm_component::schema::*;
    use helm_component::{Component, ComponentKind};
    use serde_json::json;

    use super::*;

    fn sample() -> World {
        let mut w = World::with_standard_registry();
        let ship = w
            .spawn([
                Identity {
                    name: "Odyssey".into(),
                    ..Identity::default()
                }
                .into_data(),
                Position::at(10.0, -2.5, 0.125).into_data(),
                Velocity { x: 1.0, y: 0.0, z: 0.0 }.into_data(),
            ])
            .unwrap();
        let gone = w.create_entity();
        w.spawn([IsWaypoint {
            assigned_ship_id: Some(ship),
        }
        .into_data()])
            .unwrap();
        w.remove_entity(gone).unwrap();
        w
    }

    #[test]
    fn test_snapshot_skips_removed_entities() {
        let w = sample();
        let snap = w.snapshot().unwrap();
        assert_eq!(snap.entities.len(), 2);
        assert_eq!(snap.next_entity_id, 4);
        assert_eq!(snap.entities[0].components["identity"]["name"], json!("Odyssey"));
    }

    #[test]
    fn test_msgpack_restore_preserves_state_and_cursor() {
        let w = sample();
        let bytes = w.snapshot().unwrap().to_msgpack().unwrap();
        let snap = WorldSnapshot::from_msgpack(&bytes).unwrap();
        let mut restored = World::restore(w.registry_arc(), snap).unwrap();

        assert_eq!(restored.all_entities(), w.all_entities());
        for id in w.all_entities() {
            assert_eq!(restored.components_of(id).unwrap(), w.components_of(id).unwrap());
        }
        let ship = EntityId(1);
        assert_eq!(restored.get::<Position>(ship), w.get::<Position>(ship));
        assert_eq!(restored.create_entity(), EntityId(4));
        assert!(!restored.take_changes().is_empty());
    }

    #[test]
    fn test_restore_revalidates() {
        let w = sample();
        let mut json = w.snapshot().unwrap().to_json().unwrap();
        json["entities"][0]["components"]["velocity"]["x"] = json!("fast");
        let snap = WorldSnapshot::from_json(json).unwrap();
        assert!(matches!(
            World::restore(w.registry_arc(), snap),
            Err(WorldError::Validation(_))
        ));
    }

    #[test]
    fn test_restore_rejects_unknown_component_and_duplicates() {
        let registry = Arc::new(ComponentRegistry::standard());
        let mut snap = WorldSnapshot {
            version: SNAPSHOT_VERSION,
            next_entity_id: 3,
            entities: vec![EntitySnapshot {
                id: EntityId(1),
                components: BTreeMap::from([("warpCore".to_string(), json!({}))]),
            }],
        };
        assert_eq!(
            World::restore(Arc::clone(&registry), snap.clone()).unwrap_err(),
            WorldError::UnknownComponentType("warpCore".into())
        );

        snap.entities = vec![
            EntitySnapshot {
                id: EntityId(2),
                components: BTreeMap::new(),
            },
            EntitySnapshot {
                id: EntityId(2),
                components: BTreeMap::new(),
            },
        ];
        assert!(matches!(
            World::restore(Arc::clone(&registry), snap.clone()),
            Err(WorldError::Snapshot(_))
        ));

        snap.version = 99;
        assert!(matches!(
            World::restore(registry, snap),
            Err(WorldError::Snapshot(_))
        ));
    }

    #[test]
    fn test_cursor_never_behind_restored_ids() {
        let snap = WorldSnapshot {
            version: SNAPSHOT_VERSION,
            next_entity_id: 1,
            entities: vec![EntitySnapshot {
                id: EntityId(7),
                components: BTreeMap::from([("hull".to_string(), json!({}))]),
            }],
        };
        let mut w = World::restore(Arc::new(ComponentRegistry::standard()), snap).unwrap();
        assert!(w.has_kind(EntityId(7), ComponentKind::Hull));
        assert_eq!(w.create_entity(), EntityId(8));
    }
}
