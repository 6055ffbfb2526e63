//! # helm_component
//!
//! The "C" in ECS for the helm flight simulation: what an entity is, what a
//! component is, and which component types exist.
//!
//! - [`EntityId`] / [`EntityAllocator`]: opaque, monotonically increasing ids.
//! - [`Component`]: the trait every schema struct implements.
//! - [`ComponentKind`] / [`ComponentData`]: closed runtime dispatch.
//! - [`ComponentRegistry`]: named, validated definitions with defaults.
//! - [`schema`]: the component schemas themselves.

pub mod component;
pub mod entity;
pub mod error;
pub mod registry;
pub mod schema;
pub mod validate;

pub use component::{Component, ComponentData, ComponentKind};
pub use entity::{EntityAllocator, EntityId};
pub use error::{FieldError, RegistryError, ValidationError};
pub use registry::{ComponentDef, ComponentRegistry};
pub use validate::Validate;
