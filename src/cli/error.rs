//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::{ApplicationError, RemoteError};
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// Error in a script line run by `exec`.
    #[error("{location}: {source}")]
    Script {
        location: String,
        #[source]
        source: Box<CliError>,
    },
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl CliError {
    /// The application error at the root of this failure, if any.
    pub fn application(&self) -> Option<&ApplicationError> {
        match self {
            CliError::Infra(InfraError::Application(e)) => Some(e),
            CliError::Script { source, .. } => source.application(),
            _ => None,
        }
    }

    /// Usage message when the failing command should print its usage.
    pub fn usage_message(&self) -> Option<&str> {
        match self.application() {
            Some(ApplicationError::Usage { message, .. }) => Some(message),
            _ => None,
        }
    }

    /// Server rejected our credentials.
    pub fn unauthorized(&self) -> Option<&RemoteError> {
        self.application()
            .and_then(ApplicationError::remote)
            .filter(|e| e.is_unauthorized())
    }

    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.unauthorized().is_some() {
            return crate::exitcode::AUTH;
        }
        match self.application() {
            Some(ApplicationError::Usage { exit_code, .. })
            | Some(ApplicationError::Fatal { exit_code, .. }) => *exit_code,
            Some(ApplicationError::Aborted) => crate::exitcode::ABORTED,
            _ => crate::exitcode::FAILURE,
        }
    }
}
