//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Failure reported by a remote endpoint, or a transport failure reaching it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} {url} failed: {}", self.describe())]
pub struct RemoteError {
    pub method: String,
    pub url: String,
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("{} {}", status, self.message),
            None => self.message.clone(),
        }
    }
}

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// Wrong or missing arguments; the command's usage is shown.
    #[error("{message}")]
    Usage { message: String, exit_code: i32 },

    /// Logged at error level, then the process exits with `exit_code`.
    #[error("{message}")]
    Fatal { message: String, exit_code: i32 },

    #[error("You said no, so I'm done here.")]
    Aborted,

    #[error("config error: {message}")]
    Config { message: String },

    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// Usage error exiting with the generic failure code.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            exit_code: crate::exitcode::FAILURE,
        }
    }

    /// Fatal error exiting with the generic failure code.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            exit_code: crate::exitcode::FAILURE,
        }
    }

    /// The remote error behind this failure, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
