use helm_component::EntityId;
use helm_ecs::WorldError;
use thiserror::Error;

/// Physics bridge failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("{0} has no physicsWorld component")]
    NotAPhysicsWorld(EntityId),
    #[error("no native world for {0}")]
    UnknownWorld(EntityId),
    #[error("{body} is already attached to {world}")]
    AlreadyAttached { world: EntityId, body: EntityId },
    #[error("{body} is not attached to {world}")]
    NotAttached { world: EntityId, body: EntityId },
    #[error("unknown physics backend '{0}'")]
    UnknownBackend(String),
    #[error(transparent)]
    World(#[from] WorldError),
}
