//! Application-level errors (wraps domain and store errors)

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{DomainError, MemberId};
use crate::infrastructure::error::StoreError;

/// Stable classification of every error a public operation can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    CapacityExceeded,
    InsufficientBalance,
    ValidationFailure,
    Forbidden,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application errors wrap domain errors and hide storage internals.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{message}")]
    Validation { message: String },

    #[error("member {caller} may not modify member {target}")]
    Forbidden { caller: MemberId, target: MemberId },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("storage operation failed")]
    Storage(#[source] StoreError),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::NotFound { .. } => ErrorKind::NotFound,
            ApplicationError::Domain(e) => match e {
                DomainError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
                DomainError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
                DomainError::SelfReference(_)
                | DomainError::DuplicateDownline(_)
                | DomainError::InvalidHandle(_)
                | DomainError::InvalidContact { .. }
                | DomainError::ZeroAmount => ErrorKind::ValidationFailure,
            },
            ApplicationError::Validation { .. } => ErrorKind::ValidationFailure,
            ApplicationError::Forbidden { .. } => ErrorKind::Forbidden,
            ApplicationError::Timeout { .. } => ErrorKind::Timeout,
            ApplicationError::Config { .. } | ApplicationError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for ApplicationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, key } => Self::NotFound { entity, key },
            StoreError::Duplicate { field, value } => Self::Validation {
                message: format!("{field} already taken: {value}"),
            },
            StoreError::Rejected(domain) => Self::Domain(domain),
            other => Self::Storage(other),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;

/// A broken sponsor or downline reference met during a walk.
///
/// Walks stop at the anomaly instead of failing; the anomaly is logged and
/// carried in the walk's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityAnomaly {
    MissingMember { referenced_by: Option<MemberId>, missing: MemberId },
    Cycle { at: MemberId },
}

impl fmt::Display for IntegrityAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityAnomaly::MissingMember {
                referenced_by: Some(by),
                missing,
            } => write!(f, "member {by} references missing member {missing}"),
            IntegrityAnomaly::MissingMember {
                referenced_by: None,
                missing,
            } => write!(f, "missing member {missing}"),
            IntegrityAnomaly::Cycle { at } => write!(f, "sponsor chain revisits member {at}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_store_errors_when_converting_then_kinds_are_stable() {
        let not_found: ApplicationError = StoreError::not_found("sponsor", "abc").into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let duplicate: ApplicationError = StoreError::Duplicate {
            field: "handle",
            value: "alice".into(),
        }
        .into();
        assert_eq!(duplicate.kind(), ErrorKind::ValidationFailure);

        let capacity: ApplicationError = StoreError::Rejected(DomainError::CapacityExceeded {
            sponsor: "root".into(),
            capacity: 3,
        })
        .into();
        assert_eq!(capacity.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn given_storage_failure_then_message_hides_internals() {
        let err: ApplicationError = StoreError::io(
            "write /var/lib/downline.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "storage operation failed");
    }
}
