//! Post-tick change sets.
//!
//! A [`ChangeSet`] is an immutable copy of what one tick changed, with the
//! current JSON value of every added or updated component. It is built from
//! the store right after the tick, so delivery can run concurrently with the
//! next tick without touching live state.

use std::collections::BTreeMap;

use helm_component::{ComponentKind, EntityId};
use helm_ecs::{Change, ChangeKind, World};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NotifyError;

/// What a notification is about: one component of one entity, or the entity
/// itself when `component` is `None`.
pub type Topic = (EntityId, Option<ComponentKind>);

/// One entity- or component-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub entity: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentKind>,
    pub kind: ChangeKind,
    /// Current value for added and updated components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ChangeRecord {
    /// The entity and component this record is about.
    #[must_use]
    pub fn topic(&self) -> Topic {
        (self.entity, self.component)
    }
}

/// The changes of one or more ticks, in topic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// The latest tick folded into this set.
    pub tick: u64,
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    /// Resolve the store's net changes into records carrying current values.
    pub fn capture(world: &World, tick: u64, changes: &[Change]) -> Result<Self, NotifyError> {
        let mut records = Vec::with_capacity(changes.len());
        for change in changes {
            let value = match (change.kind, change.component) {
                (ChangeKind::ComponentAdded | ChangeKind::ComponentUpdated, Some(kind)) => world
                    .get_data(change.entity, kind)
                    .map(|data| {
                        data.to_json().map_err(|e| NotifyError::Serialize {
                            entity: change.entity,
                            component: kind.name(),
                            message: e.to_string(),
                        })
                    })
                    .transpose()?,
                _ => None,
            };
            records.push(ChangeRecord {
                entity: change.entity,
                component: change.component,
                kind: change.kind,
                value,
            });
        }
        Ok(Self { tick, records })
    }

    /// A set from records already in topic order.
    #[must_use]
    pub fn from_records(tick: u64, records: Vec<ChangeRecord>) -> Self {
        Self { tick, records }
    }

    /// The records, in topic order.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Iterate the records.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record for one topic, if this set has one.
    pub fn get(&self, entity: EntityId, component: Option<ComponentKind>) -> Option<&ChangeRecord> {
        self.records.iter().find(|r| r.topic() == (entity, component))
    }

    /// The records `keep` accepts, as a new set for the same tick.
    pub fn retain_view(&self, mut keep: impl FnMut(&ChangeRecord) -> bool) -> ChangeSet {
        ChangeSet {
            tick: self.tick,
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Fold a newer set into this one so that each topic keeps only its
    /// latest state. An entity removal drops everything older about that
    /// entity; an add followed by a remove cancels out.
    pub fn merge(&mut self, newer: ChangeSet) {
        let mut topics: BTreeMap<Topic, ChangeRecord> = std::mem::take(&mut self.records)
            .into_iter()
            .map(|r| (r.topic(), r))
            .collect();

        for record in newer.records {
            let topic = record.topic();
            if record.kind == ChangeKind::EntityRemoved {
                let created_here = topics
                    .get(&topic)
                    .is_some_and(|r| r.kind == ChangeKind::EntityCreated);
                topics.retain(|(entity, _), _| *entity != record.entity);
                if !created_here {
                    topics.insert(topic, record);
                }
                continue;
            }
            let previous = topics.get(&topic).map(|r| r.kind);
            match (previous, record.kind) {
                (Some(ChangeKind::ComponentAdded), ChangeKind::ComponentRemoved) => {
                    topics.remove(&topic);
                }
                (Some(ChangeKind::ComponentAdded), ChangeKind::ComponentUpdated) => {
                    topics.insert(
                        topic,
                        ChangeRecord {
                            kind: ChangeKind::ComponentAdded,
                            ..record
                        },
                    );
                }
                (Some(ChangeKind::ComponentRemoved), ChangeKind::ComponentAdded) => {
                    topics.insert(
                        topic,
                        ChangeRecord {
                            kind: ChangeKind::ComponentUpdated,
                            ..record
                        },
                    );
                }
                _ => {
                    topics.insert(topic, record);
                }
            }
        }

        self.tick = self.tick.max(newer.tick);
        self.records = topics.into_values().collect();
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
