//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::{ApplicationError, ErrorKind};
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Store { .. } => crate::exitcode::IOERR,
                InfraError::Config { .. } => crate::exitcode::CONFIG,
                InfraError::Application(ApplicationError::Config { .. }) => {
                    crate::exitcode::CONFIG
                }
                InfraError::Application(app) => match app.kind() {
                    ErrorKind::NotFound => crate::exitcode::NOINPUT,
                    ErrorKind::CapacityExceeded
                    | ErrorKind::InsufficientBalance
                    | ErrorKind::ValidationFailure => crate::exitcode::DATAERR,
                    ErrorKind::Forbidden => crate::exitcode::NOPERM,
                    ErrorKind::Timeout => crate::exitcode::TEMPFAIL,
                    ErrorKind::Internal => crate::exitcode::SOFTWARE,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn given_application_errors_when_mapping_then_sysexits_codes() {
        let not_found: CliError = ApplicationError::not_found("member", "ghost").into();
        assert_eq!(not_found.exit_code(), crate::exitcode::NOINPUT);

        let broke: CliError = ApplicationError::Domain(DomainError::InsufficientBalance {
            requested: 10,
            available: 0,
        })
        .into();
        assert_eq!(broke.exit_code(), crate::exitcode::DATAERR);

        let config: CliError = ApplicationError::Config {
            message: "bad".into(),
        }
        .into();
        assert_eq!(config.exit_code(), crate::exitcode::CONFIG);
    }
}
