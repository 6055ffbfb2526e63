use helm_ecs::WorldError;
use helm_physics::PhysicsError;
use thiserror::Error;

/// Why one system's update failed for one entity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SystemError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error("system panicked: {0}")]
    Panicked(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<helm_component::RegistryError> for SystemError {
    fn from(e: helm_component::RegistryError) -> Self {
        SystemError::World(e.into())
    }
}
