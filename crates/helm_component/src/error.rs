//! Validation and registry errors.

use thiserror::Error;

/// A single field failed its schema constraint.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("field '{field}': {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    /// A field-level failure.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A payload does not match its component's schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation error on '{component}': {message}")]
pub struct ValidationError {
    pub component: String,
    pub message: String,
}

impl ValidationError {
    /// A failure attributed to one component type.
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while defining or resolving component types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("unknown component type: {0}")]
    UnknownComponentType(String),
    #[error("component '{0}' is already defined")]
    DuplicateComponent(String),
    #[error("component '{component}' required by '{required_by}' is not registered")]
    MissingComponent {
        component: String,
        required_by: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
