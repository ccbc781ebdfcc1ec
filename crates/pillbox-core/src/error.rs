//! # Error Types
//!
//! Domain-specific error types for pillbox-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pillbox-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule failures                           │
//! │  └── ValidationError  - One rejected field                             │
//! │                                                                         │
//! │  pillbox-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── RepositoryError  - Terminal outcome of an async request           │
//! │                                                                         │
//! │  Flow: ValidationError → RepositoryError → presentation layer          │
//! │        DbError         → RepositoryError → presentation layer          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, name, id)
//! 3. Errors are enum variants, never String
//! 4. Each variant's `Display` is the message shown to the user

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A dose was requested from a medication with nothing left.
    ///
    /// ## When This Occurs
    /// ```text
    /// take_dose(id)
    ///      │
    ///      ▼
    /// remaining_quantity == 0
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Aspirin", remaining: 0, requested: 1 }
    ///      │
    ///      ▼
    /// UI shows: "Not enough Aspirin left: 0 remaining, 1 needed"
    /// ```
    #[error("Not enough {name} left: {remaining} remaining, {requested} needed")]
    InsufficientStock {
        name: String,
        remaining: u32,
        requested: u32,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Each value describes exactly one rule a candidate record broke. The
/// validators collect all of them; callers usually show the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is below its floor.
    #[error("{field} must be at least {min}")]
    TooSmall { field: String, min: i64 },

    /// Invalid format (e.g. characters outside the allowed set).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Dose larger than what is left.
    #[error("dosage per intake ({dosage}) cannot exceed remaining quantity ({remaining})")]
    DosageExceedsRemaining { dosage: u32, remaining: u32 },

    /// Threshold larger than the quantity ever purchased.
    #[error("low stock threshold ({threshold}) cannot exceed total quantity ({total})")]
    ThresholdExceedsTotal { threshold: u32, total: u32 },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn too_long(field: &str, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.to_string(),
            max,
        }
    }

    pub(crate) fn too_small(field: &str, min: i64) -> Self {
        ValidationError::TooSmall {
            field: field.to_string(),
            min,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            name: "Aspirin".to_string(),
            remaining: 0,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Not enough Aspirin left: 0 remaining, 2 needed"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("name").to_string(), "name is required");
        assert_eq!(
            ValidationError::too_long("name", 100).to_string(),
            "name must be at most 100 characters"
        );
        assert_eq!(
            ValidationError::DosageExceedsRemaining {
                dosage: 3,
                remaining: 1
            }
            .to_string(),
            "dosage per intake (3) cannot exceed remaining quantity (1)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
