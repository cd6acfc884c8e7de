use thiserror::Error;

use stockbook_core::DomainError;
use stockbook_infra::command_dispatcher::DispatchError;

/// Service-level error, the boundary taxonomy the HTTP layer translates
/// into status codes and user-facing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("insufficient stock: requested {requested}, remaining {remaining}")]
    InsufficientStock { requested: u64, remaining: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound => "not_found",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => ServiceError::Validation(msg),
            DispatchError::NotFound => ServiceError::NotFound,
            DispatchError::InsufficientStock {
                requested,
                remaining,
            } => ServiceError::InsufficientStock {
                requested,
                remaining,
            },
            DispatchError::Conflict(msg) => ServiceError::Conflict(msg),
            // The stream lock serializes writers; a concurrency refusal here
            // means something is wrong with the wiring, not with the caller.
            DispatchError::Concurrency(msg) => ServiceError::Internal(msg),
            DispatchError::Deserialize(msg) => ServiceError::Internal(msg),
            DispatchError::Store(e) => ServiceError::Internal(e.to_string()),
            DispatchError::Publish(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::NotFound => ServiceError::NotFound,
            DomainError::InsufficientStock {
                requested,
                remaining,
            } => ServiceError::InsufficientStock {
                requested,
                remaining,
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
        }
    }
}
