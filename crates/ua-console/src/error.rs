// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the console.

use thiserror::Error;
use ua_client::UaError;

/// Result type alias for console operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Errors that end a console command.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Invalid arguments or configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Client library error.
    #[error(transparent)]
    Client(#[from] UaError),

    /// Some nodes of a batched read failed.
    #[error("{failed} of {total} node(s) failed")]
    PartialFailure {
        /// Number of failed nodes.
        failed: usize,
        /// Number of requested nodes.
        total: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<ConsoleError>,
    },
}

impl ConsoleError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Client(error) => match error {
                UaError::Configuration(_) => 1,
                UaError::EndpointNotFound { .. } | UaError::CertificateInvalid(_) => 2,
                UaError::ConnectionFailed { .. } | UaError::Timeout { .. } => 3,
                UaError::ServiceFailure { .. } | UaError::PerItemFailure { .. } => 4,
                UaError::Io { .. } => 6,
            },
            Self::PartialFailure { .. } => 5,
            Self::Io(_) => 6,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("encoding output: {}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &ConsoleError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let ConsoleError::Client(client) = error {
        for hint in client.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with its exit code.
pub fn report_error_and_exit(error: ConsoleError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use ua_client::WaitOutcome;

    #[test]
    fn test_error_with_context() {
        let err = ConsoleError::config("missing url").with_context("listen");
        assert_eq!(err.to_string(), "listen: Configuration error: missing url");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_client_exit_codes() {
        let timeout = ConsoleError::from(UaError::timeout(
            "reverse connect",
            Duration::from_secs(20),
            WaitOutcome::Elapsed,
        ));
        assert_eq!(timeout.exit_code(), 3);

        let not_found = ConsoleError::from(UaError::endpoint_not_found("opc.tcp://plc:4840", "SignAndEncrypt"));
        assert_eq!(not_found.exit_code(), 2);
    }

    #[test]
    fn test_partial_failure() {
        let err = ConsoleError::PartialFailure { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 node(s) failed");
        assert_eq!(err.exit_code(), 5);
    }
}
