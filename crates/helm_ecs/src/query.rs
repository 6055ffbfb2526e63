//! Declarative entity filters.
//!
//! A [`Query`] names the component kinds an entity must have, must not have,
//! and (optionally) must have changed since the change set was last taken.

use helm_component::ComponentKind;
use serde::{Deserialize, Serialize};

use crate::change::ChangeTracker;
use crate::world::EntityRecord;

/// Component filter for selecting entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    /// Entity must have ALL of these.
    pub with: Vec<ComponentKind>,
    /// Entity must have NONE of these.
    pub without: Vec<ComponentKind>,
    /// If non-empty, at least one must have been added or updated.
    pub changed: Vec<ComponentKind>,
}

impl Query {
    /// A query matching every live entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a query requiring all of `kinds`.
    #[must_use]
    pub fn all_of(kinds: &[ComponentKind]) -> Self {
        Self {
            with: kinds.to_vec(),
            ..Self::default()
        }
    }

    /// Also require `kind`.
    #[must_use]
    pub fn with(mut self, kind: ComponentKind) -> Self {
        self.with.push(kind);
        self
    }

    /// Exclude entities carrying `kind`.
    #[must_use]
    pub fn without(mut self, kind: ComponentKind) -> Self {
        self.without.push(kind);
        self
    }

    /// Match only if `kind` changed since the last drain.
    #[must_use]
    pub fn changed(mut self, kind: ComponentKind) -> Self {
        self.changed.push(kind);
        self
    }

    pub(crate) fn matches(
        &self,
        id: helm_component::EntityId,
        record: &EntityRecord,
        changes: &ChangeTracker,
    ) -> bool {
        if !self.with.iter().all(|k| record.has(*k)) {
            return false;
        }
        if self.without.iter().any(|k| record.has(*k)) {
            return false;
        }
        self.changed.is_empty() || self.changed.iter().any(|k| changes.is_dirty(id, *k))
    }
}
