use helm_component::EntityId;
use thiserror::Error;

/// Notification failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotifyError {
    #[error("component '{component}' of {entity} did not serialise: {message}")]
    Serialize {
        entity: EntityId,
        component: &'static str,
        message: String,
    },
}
