//! Error taxonomy shared by the registry and the launcher.

use thiserror::Error;

/// Failure raised by a suite runner.
pub type RunnerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single runner invocation.
pub type SuiteResult = Result<(), RunnerError>;

/// Errors surfaced while registering, selecting or running suites.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuiteError {
    /// A second suite tried to claim an existing name. Fatal at startup.
    #[error("benchmark suite '{name}' is already registered")]
    DuplicateSuite {
        /// Name that was registered twice
        name: String,
    },

    /// The selected name matches no registered suite.
    #[error("unknown benchmark suite '{name}' (available: {})", .available.join(", "))]
    SuiteNotFound {
        /// Requested name
        name: String,
        /// Registered names in registration order
        available: Vec<String>,
    },

    /// The suite ran but its runner failed or panicked.
    #[error("benchmark suite '{name}' failed: {cause}")]
    SuiteExecution {
        /// Suite that failed
        name: String,
        /// Error or panic message from the runner
        cause: String,
    },
}

impl SuiteError {
    /// Name of the suite the error is about.
    pub fn suite_name(&self) -> &str {
        match self {
            SuiteError::DuplicateSuite { name }
            | SuiteError::SuiteNotFound { name, .. }
            | SuiteError::SuiteExecution { name, .. } => name,
        }
    }
}
