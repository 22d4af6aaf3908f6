// Central Error Type for the Application

use thiserror::Error;

/// Startup errors: anything that stops a run before a process is spawned
///
/// Runtime failures of the supervised command are never surfaced here; they end up in the
/// terminal snapshot instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Command, DomainError};

    #[test]
    fn test_domain_errors_convert() {
        fn parse(args: Vec<String>) -> Result<Command> {
            Ok(Command::new(args)?)
        }

        let err = parse(Vec::new()).unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::EmptyCommand)));
        assert_eq!(err.to_string(), "Domain error: empty command");
    }
}
