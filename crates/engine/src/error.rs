//! Engine error types
//!
//! Each failure class maps to a distinct handling policy: validation aborts
//! an import with no partial mutation, persistence failures are logged and
//! retried on the next interaction, hydration timeouts silently skip a
//! single field, and handler errors are isolated to the listener that threw.

use thiserror::Error;

use sheetbldr_domain::DomainError;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed import: surfaced to the caller, nothing was applied.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A domain invariant rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage backend failure.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Errors from the storage ports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport-level error (e.g., database write failure).
    #[error("Database error: {0}")]
    Database(String),

    /// Snapshot could not be (de)serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error raised by an event listener. Routed to the bus error sink; never
/// propagated to the emitter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
