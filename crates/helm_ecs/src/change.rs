//! Per-tick change tracking.
//!
//! Every successful mutation records an entry keyed by (entity, component).
//! Entries coalesce so a tick's change set holds at most one entry per key,
//! describing the net effect of the tick.

use std::collections::BTreeMap;

use helm_component::{ComponentKind, EntityId};
use serde::{Deserialize, Serialize};

/// What happened to an entity or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    EntityCreated,
    EntityRemoved,
    ComponentAdded,
    ComponentUpdated,
    ComponentRemoved,
}

/// One net change. `component` is `None` for entity-level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub entity: EntityId,
    pub component: Option<ComponentKind>,
    pub kind: ChangeKind,
}

/// Net changes since the last drain, folded per entity and component.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    entities: BTreeMap<EntityId, ChangeKind>,
    components: BTreeMap<(EntityId, ComponentKind), ChangeKind>,
}

impl ChangeTracker {
    /// Record a new entity.
    pub fn entity_created(&mut self, entity: EntityId) {
        self.entities.insert(entity, ChangeKind::EntityCreated);
    }

    /// Record a removal. Component changes for the entity are dropped, and a create-then-remove
    /// cancels out.
    pub fn entity_removed(&mut self, entity: EntityId) {
        self.components.retain(|(e, _), _| *e != entity);
        match self.entities.get(&entity) {
            Some(ChangeKind::EntityCreated) => {
                self.entities.remove(&entity);
            }
            _ => {
                self.entities.insert(entity, ChangeKind::EntityRemoved);
            }
        }
    }

    /// Record a component change, folded into any earlier one for the same key.
    pub fn component(&mut self, entity: EntityId, component: ComponentKind, kind: ChangeKind) {
        let key = (entity, component);
        let merged = match (self.components.get(&key).copied(), kind) {
            (Some(ChangeKind::ComponentAdded), ChangeKind::ComponentUpdated) => {
                Some(ChangeKind::ComponentAdded)
            }
            (Some(ChangeKind::ComponentAdded), ChangeKind::ComponentRemoved) => None,
            (Some(ChangeKind::ComponentRemoved), ChangeKind::ComponentAdded) => {
                Some(ChangeKind::ComponentUpdated)
            }
            (_, next) => Some(next),
        };
        match merged {
            Some(k) => {
                self.components.insert(key, k);
            }
            None => {
                self.components.remove(&key);
            }
        }
    }

    /// Was `component` on `entity` added or updated since the last take?
    #[must_use]
    pub fn is_dirty(&self, entity: EntityId, component: ComponentKind) -> bool {
        matches!(
            self.components.get(&(entity, component)),
            Some(ChangeKind::ComponentAdded | ChangeKind::ComponentUpdated)
        )
    }

    /// Nothing recorded since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.components.is_empty()
    }

    /// Net changes, ordered by entity id with entity-level entries first.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        let mut out = Vec::with_capacity(self.entities.len() + self.components.len());
        let mut components = self.components.iter().peekable();
        let mut entities = self.entities.iter().peekable();
        loop {
            let next_entity = entities.peek().map(|(e, _)| **e);
            let next_component = components.peek().map(|((e, _), _)| *e);
            match (next_entity, next_component) {
                (Some(e), Some(c)) if e <= c => {
                    if let Some((entity, kind)) = entities.next() {
                        out.push(Change {
                            entity: *entity,
                            component: None,
                            kind: *kind,
                        });
                    }
                }
                (_, Some(_)) => {
                    if let Some(((entity, component), kind)) = components.next() {
                        out.push(Change {
                            entity: *entity,
                            component: Some(*component),
                            kind: *kind,
                        });
                    }
                }
                (Some(_), None) => {
                    if let Some((entity, kind)) = entities.next() {
                        out.push(Change {
                            entity: *entity,
                            component: None,
                            kind: *kind,
                        });
                    }
                }
                (None, None) => break,
            }
        }
        out
    }

    /// Return the net changes and reset.
    pub fn take(&mut self) -> Vec<Change> {
        let out = self.changes();
        self.clear();
        out
    }

    /// Forget everything recorded.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.components.clear();
    }
}
