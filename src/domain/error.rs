//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::MemberId;

/// Domain errors represent business rule violations on a single entity.
/// These are independent of storage concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("sponsor {sponsor} already has {capacity} downlines")]
    CapacityExceeded { sponsor: String, capacity: usize },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("member cannot be its own downline: {0}")]
    SelfReference(MemberId),

    #[error("member {0} is already a downline")]
    DuplicateDownline(MemberId),

    #[error("invalid handle {0:?}: use 3-32 letters, digits, '.', '_' or '-'")]
    InvalidHandle(String),

    #[error("invalid {field}: {value:?}")]
    InvalidContact { field: &'static str, value: String },

    #[error("amount must be greater than zero")]
    ZeroAmount,
}
