//! Error types shared by the forwarder crates.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use thiserror::Error;

/// Result type alias for forwarder operations.
pub type FwdResult<T> = Result<T, FwdError>;

/// Errors that can occur while programming the dataplane.
#[derive(Debug, Error)]
pub enum FwdError {
    /// Failed to spawn an external command.
    #[error("failed to execute command '{command}': {source}")]
    Exec {
        /// The command that failed to spawn.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// External command returned a non-zero exit code.
    #[error("command failed: '{command}' (exit code {exit_code}): {output}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Malformed input (IP address, mechanism parameter, command output).
    #[error("parse error for {what}: {message}")]
    Parse {
        /// What was being parsed.
        what: String,
        /// Error message.
        message: String,
    },

    /// A host link or bridge port was not found.
    #[error("'{name}' not found")]
    NotFound {
        /// Link or port name.
        name: String,
    },

    /// The operation deadline expired or the caller cancelled.
    #[error("operation cancelled: {message}")]
    Cancelled {
        /// What was cancelled.
        message: String,
    },

    /// Invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// A request failure joined with the teardown failure it triggered.
    #[error("{request}; connection closed with error: {close}")]
    Joined {
        /// The original request error.
        #[source]
        request: Box<FwdError>,
        /// The error raised while undoing the request.
        close: Box<FwdError>,
    },
}

impl FwdError {
    /// Creates a parse error.
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Joins a request error with the error of the close that followed it.
    ///
    /// Teardown after a failed request must not drop either failure; the
    /// request error stays the primary cause.
    pub fn joined(request: FwdError, close: FwdError) -> Self {
        Self::Joined {
            request: Box::new(request),
            close: Box::new(close),
        }
    }

    /// Returns true if this error means the target was already gone.
    ///
    /// Teardown paths demote this to success: the link or port being
    /// absent is the state teardown was trying to reach.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FwdError::NotFound { .. })
    }
}

/// Joins an optional prior error with a new one, preserving both.
pub fn join_errors(prior: Option<FwdError>, next: FwdError) -> FwdError {
    match prior {
        Some(prior) => FwdError::joined(prior, next),
        None => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FwdError::not_found("tapsrc-1");
        assert_eq!(err.to_string(), "'tapsrc-1' not found");
    }

    #[test]
    fn test_command_failed_display() {
        let err = FwdError::CommandFailed {
            command: "ovs-vsctl del-port br-nsm tap0".to_string(),
            exit_code: 1,
            output: "no port named tap0".to_string(),
        };
        assert!(err.to_string().contains("del-port br-nsm tap0"));
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_joined_keeps_both() {
        let err = FwdError::joined(
            FwdError::internal("request failed"),
            FwdError::not_found("tapdst-1"),
        );
        let text = err.to_string();
        assert!(text.contains("request failed"));
        assert!(text.contains("'tapdst-1' not found"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(FwdError::not_found("x").is_not_found());
        assert!(!FwdError::internal("x").is_not_found());
    }
}
