//! Structural checks that serde alone cannot express (ranges, cross-field
//! rules). Shape and enum checks happen during deserialisation.

use crate::error::FieldError;

/// Range and consistency rules for a component or a composed schema type.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldError>;
}

/// Fail with `message` on `field` unless `condition` holds.
pub fn ensure(condition: bool, field: &str, message: &str) -> Result<(), FieldError> {
    if condition {
        Ok(())
    } else {
        Err(FieldError::new(field, message))
    }
}

/// `value` must be finite.
pub fn finite(field: &str, value: f64) -> Result<(), FieldError> {
    ensure(value.is_finite(), field, "must be a finite number")
}

/// `value` must be finite and at least zero.
pub fn non_negative(field: &str, value: f64) -> Result<(), FieldError> {
    finite(field, value)?;
    ensure(value >= 0.0, field, "must not be negative")
}

/// `value` must be finite and above zero.
pub fn positive(field: &str, value: f64) -> Result<(), FieldError> {
    finite(field, value)?;
    ensure(value > 0.0, field, "must be greater than zero")
}
