use helm_component::RegistryError;
use helm_ecs::WorldError;
use helm_notify::NotifyError;
use helm_physics::PhysicsError;
use thiserror::Error;

use crate::flight::FlightId;

/// Errors returned by flights and their drivers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlightError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("flight {0} not found")]
    UnknownFlight(FlightId),
    #[error("flight has stopped")]
    Stopped,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FlightError {
    /// Stable camelCase tag for error replies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FlightError::World(e) | FlightError::Physics(PhysicsError::World(e)) => e.kind(),
            FlightError::Physics(_) => "physics",
            FlightError::Registry(e) => WorldError::from(e.clone()).kind(),
            FlightError::Notify(_) => "notify",
            FlightError::UnknownFlight(_) => "unknownFlight",
            FlightError::Stopped => "stopped",
            FlightError::Config(_) => "config",
        }
    }
}
