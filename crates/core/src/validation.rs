//! Validation utilities
//!
//! Common argument checks used by the ledger and configuration crates.

use crate::error::{CoreError, CoreResult};

/// Validate a string is not empty
pub fn validate_non_empty(s: &str, field_name: &str) -> CoreResult<()> {
    if s.trim().is_empty() {
        return Err(CoreError::validation(format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Validate a numeric value is between min and max (inclusive)
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> CoreResult<()> {
    if value < min || value > max {
        return Err(CoreError::validation(format!(
            "{} must be between {} and {}, got {}",
            field_name, min, max, value
        )));
    }
    Ok(())
}

/// Validate a numeric value is strictly positive
pub fn validate_positive<T: PartialOrd + Default + std::fmt::Display>(
    value: T,
    field_name: &str,
) -> CoreResult<()> {
    if value <= T::default() {
        return Err(CoreError::validation(format!(
            "{} must be greater than zero, got {}",
            field_name, value
        )));
    }
    Ok(())
}
