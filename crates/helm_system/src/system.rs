//! The system abstraction: a filter plus a per-entity update rule.

use helm_component::ComponentKind;
use helm_component::EntityId;
use helm_ecs::{EntityRef, Query};

use crate::context::SystemContext;
use crate::error::SystemError;

/// A simulation rule run once per tick over every entity it matches.
///
/// An entity is matched when it satisfies [`System::query`] and then
/// [`System::matches`]. The matched set is taken before the first update of
/// the pass, so updates may freely create or remove entities.
pub trait System: Send {
    /// Stable name used in logs and fault reports.
    fn name(&self) -> &'static str;

    /// Component presence filter.
    fn query(&self) -> Query;

    /// Further per-entity test, evaluated on the pass's snapshot.
    fn matches(&self, _entity: EntityRef<'_>) -> bool {
        true
    }

    /// Component kinds touched beyond those in the query. Checked against the
    /// registry when the system is registered.
    fn uses(&self) -> &'static [ComponentKind] {
        &[]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError>;
}
