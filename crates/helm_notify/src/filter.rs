//! Subscriber filters.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use helm_component::{ComponentKind, EntityId};
use helm_ecs::ChangeKind;

use crate::change_set::{ChangeRecord, ChangeSet};

/// A predicate over change records, supplied at subscribe time.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&ChangeRecord) -> bool + Send + Sync>);

impl Filter {
    /// A filter from an arbitrary predicate.
    pub fn new(predicate: impl Fn(&ChangeRecord) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Accepts every record.
    #[must_use]
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// Records about one entity.
    #[must_use]
    pub fn entity(id: EntityId) -> Self {
        Self::new(move |r| r.entity == id)
    }

    /// Records about any of `ids`.
    pub fn entities(ids: impl IntoIterator<Item = EntityId>) -> Self {
        let ids: BTreeSet<EntityId> = ids.into_iter().collect();
        Self::new(move |r| ids.contains(&r.entity))
    }

    /// Changes to the given component kinds, plus entity removals so cached
    /// views of removed entities can be dropped.
    pub fn components(kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        let kinds: BTreeSet<ComponentKind> = kinds.into_iter().collect();
        Self::new(move |r| match r.component {
            Some(kind) => kinds.contains(&kind),
            None => r.kind == ChangeKind::EntityRemoved,
        })
    }

    /// Both filters must accept.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        Self::new(move |r| self.matches(r) && other.matches(r))
    }

    /// Does this filter accept `record`?
    pub fn matches(&self, record: &ChangeRecord) -> bool {
        (self.0)(record)
    }

    /// The part of `set` this filter accepts.
    pub fn apply(&self, set: &ChangeSet) -> ChangeSet {
        set.retain_view(|r| self.matches(r))
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entity: u64, component: Option<ComponentKind>, kind: ChangeKind) -> ChangeRecord {
        ChangeRecord {
            entity: EntityId(entity),
            component,
            kind,
            value: None,
        }
    }

    #[test]
    fn test_component_filter_keeps_removals() {
        let filter = Filter::components([ComponentKind::Position]);
        assert!(filter.matches(&record(1, Some(ComponentKind::Position), ChangeKind::ComponentUpdated)));
        assert!(!filter.matches(&record(1, Some(ComponentKind::Hull), ChangeKind::ComponentUpdated)));
        assert!(filter.matches(&record(1, None, ChangeKind::EntityRemoved)));
        assert!(!filter.matches(&record(1, None, ChangeKind::EntityCreated)));
    }

    #[test]
    fn test_and_combines() {
        let filter = Filter::entity(EntityId(2)).and(Filter::components([ComponentKind::Hull]));
        let set = ChangeSet::from_records(
            3,
            vec![
                record(1, Some(ComponentKind::Hull), ChangeKind::ComponentUpdated),
                record(2, Some(ComponentKind::Hull), ChangeKind::ComponentUpdated),
                record(2, Some(ComponentKind::Shields), ChangeKind::ComponentUpdated),
            ],
        );
        let view = filter.apply(&set);
        assert_eq!(view.tick, 3);
        assert_eq!(view.records(), &set.records()[1..2]);
    }
}
