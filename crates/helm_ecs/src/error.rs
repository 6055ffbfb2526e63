//! Store errors. Every one of them is reported synchronously at the mutation
//! boundary and leaves the store unchanged.

use helm_component::{ComponentKind, EntityId, RegistryError, ValidationError};
use thiserror::Error;

/// Why a store operation was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("unknown component type: {0}")]
    UnknownComponentType(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("component '{component}' not present on {entity}")]
    ComponentNotPresent {
        entity: EntityId,
        component: ComponentKind,
    },
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<RegistryError> for WorldError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownComponentType(name) => WorldError::UnknownComponentType(name),
            RegistryError::Validation(v) => WorldError::Validation(v),
            RegistryError::DuplicateComponent(name) => {
                WorldError::InvalidMutation(format!("duplicate component definition '{name}'"))
            }
            RegistryError::MissingComponent { component, .. } => {
                WorldError::UnknownComponentType(component)
            }
        }
    }
}

impl WorldError {
    /// Stable camelCase tag for error replies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            WorldError::EntityNotFound(_) => "entityNotFound",
            WorldError::UnknownComponentType(_) => "unknownComponentType",
            WorldError::Validation(_) => "validation",
            WorldError::ComponentNotPresent { .. } => "componentNotPresent",
            WorldError::InvalidMutation(_) => "invalidMutation",
            WorldError::Snapshot(_) => "snapshot",
        }
    }
}
