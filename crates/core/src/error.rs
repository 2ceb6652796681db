//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic rejection of a command by an aggregate.
///
/// Every variant here is a business decision (bad input, a lifecycle rule,
/// a duplicate). Infrastructure failures never surface as `DomainError`;
/// they have their own types at the store and dispatch layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Command input failed validation (empty assessment name, zero license
    /// count, question index out of range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lifecycle rule was violated (answering a session that never
    /// started, consuming from a depleted pool).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The command targets an aggregate with no history.
    #[error("not found")]
    NotFound,

    /// The command collides with existing state (duplicate creation,
    /// re-adding a roster member).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
