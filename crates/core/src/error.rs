//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, workflow state, stock bounds). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, quantity out of bounds).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The record's current status does not allow the operation
    /// (final status, wrong source status for a transition, editing locked).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A stock exit would leave the article below zero.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: Decimal, requested: Decimal },

    /// A stock entry would push the article above its configured maximum.
    #[error("stock would exceed maximum {maximum} (resulting {resulting})")]
    StockExceedsMaximum { maximum: Decimal, resulting: Decimal },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (duplicate code, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor lacks the capability required for the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Whether this error is a business-rule rejection (as opposed to a missing
    /// record or a concurrency conflict).
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvariantViolation(_)
                | Self::InvalidState(_)
                | Self::InsufficientStock { .. }
                | Self::StockExceedsMaximum { .. }
        )
    }
}
