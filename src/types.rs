//! Error types for the commission engine.

use crate::store::StoreError;

/// Errors surfaced by engine operations.
///
/// A duplicate sale is deliberately absent: replaying a `sale_id` is a
/// successful idempotent no-op that returns the original commission split.
#[derive(Debug, thiserror::Error)]
pub enum UplineError {
    /// Unknown agent or sale reference
    #[error("not found: {0}")]
    NotFound(String),

    /// The owner already has an agent record
    #[error("owner {0} is already registered as an agent")]
    AlreadyRegistered(String),

    /// Sale amounts must be positive
    #[error("invalid sale amount: {0} cents")]
    InvalidAmount(i64),

    /// Rejected state or rank change (rank may only increase)
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Optimistic-concurrency conflict; retryable with the same arguments
    #[error("conflict: {0}")]
    Conflict(String),

    /// Document failed schema validation at the store boundary
    #[error("schema error: {0}")]
    Schema(String),

    /// Underlying store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl UplineError {
    /// Whether the caller may safely retry with the same idempotency key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UplineError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, UplineError>;

/// Shorthand for mapping bson (de)serialization failures.
pub(crate) fn schema_err(e: impl std::fmt::Display) -> UplineError {
    UplineError::Schema(e.to_string())
}
