//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation,
/// stock rules, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or constraint-violating input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A sale asked for more units than the product has left.
    ///
    /// Distinct from `Validation`: the request is well-formed, the business
    /// rule (all-or-nothing fulfillment) rejects it.
    #[error("insufficient stock: requested {requested}, remaining {remaining}")]
    InsufficientStock { requested: u64, remaining: u64 },

    /// A conflict occurred (e.g. deleting a product with recorded history).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_stock(requested: u64, remaining: u64) -> Self {
        Self::InsufficientStock {
            requested,
            remaining,
        }
    }
}
