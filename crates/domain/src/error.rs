//! Unified error types for the domain layer
//!
//! Provides a common error type that can be used across all sheet operations,
//! enabling consistent error handling without forcing adapters to use String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., malformed snapshot field)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A widget index was outside its capacity
    #[error("Index {index} out of bounds for capacity {max}")]
    OutOfBounds { index: usize, max: usize },

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A named widget does not exist on the sheet
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The sheet is locked and the field is not whitelisted
    #[error("Sheet is locked: {0} is not editable")]
    Locked(String),
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    ///
    /// Use this when sheet invariants or snapshot constraints are violated:
    /// - Required fields are empty or missing
    /// - Values are outside allowed ranges
    /// - A snapshot section has the wrong shape
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an out-of-bounds error for a widget click or resize
    pub fn out_of_bounds(index: usize, max: usize) -> Self {
        Self::OutOfBounds { index, max }
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Create an unknown-field error
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Create a locked-sheet rejection
    pub fn locked(field: impl Into<String>) -> Self {
        Self::Locked(field.into())
    }
}
