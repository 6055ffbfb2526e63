//! # helm_ecs
//!
//! The entity store for one flight.
//!
//! - [`World`]: entities, validated component mutations, deferred removal.
//! - [`Query`]: with / without / changed filters over component kinds.
//! - [`Change`]: per-tick net changes feeding the notification layer.
//! - [`WorldSnapshot`]: persistable form of the whole store.
//! - [`ComponentQuery`] / [`Mutation`]: external read and write requests.

pub mod api;
pub mod change;
pub mod error;
pub mod query;
pub mod snapshot;
pub mod world;

pub use api::{ComponentQuery, EntityView, Mutation, MutationOp, MutationOutcome, MutationTarget};
pub use change::{Change, ChangeKind};
pub use error::WorldError;
pub use query::Query;
pub use snapshot::{EntitySnapshot, SNAPSHOT_VERSION, WorldSnapshot};
pub use world::{EntityRecord, EntityRef, RemovedEntity, World};
