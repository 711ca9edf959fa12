//! Error types for the invoker module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent an invocation from producing an outcome.
///
/// A process that runs and exits non-zero is not an error at this level;
/// it is reported through [`InvocationOutcome`](super::InvocationOutcome).
#[derive(Debug, Error)]
pub enum InvokerError {
    /// Program could not be found.
    #[error("program not found: {program}")]
    ProgramNotFound { program: PathBuf },

    /// Process did not finish in time and was killed.
    ///
    /// Carries whatever the process wrote to stdout before it was killed.
    #[error("invocation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64, stdout: String },

    /// I/O error while spawning or waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InvokerError {
    /// Whether retrying the same invocation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(InvokerError::Timeout {
            timeout_ms: 10,
            stdout: String::new()
        }
        .is_retryable());
        assert!(!InvokerError::ProgramNotFound {
            program: PathBuf::from("davis_to_adder")
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        let err = InvokerError::ProgramNotFound {
            program: PathBuf::from("/opt/bin/adderinfo"),
        };
        assert_eq!(err.to_string(), "program not found: /opt/bin/adderinfo");
    }
}
