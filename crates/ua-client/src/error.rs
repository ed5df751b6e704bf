// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for session establishment and paginated reads.
//!
//! The top-level [`UaError`] mirrors the failure classes a caller has to tell
//! apart when talking to a server:
//!
//! ```text
//! UaError
//! ├── EndpointNotFound    - no advertised endpoint matches the security request
//! ├── CertificateInvalid  - own certificate unusable, or server certificate rejected
//! ├── ConnectionFailed    - discovery, rendezvous or session creation failed
//! ├── Timeout             - reverse-connect wait elapsed or was cancelled
//! ├── ServiceFailure      - server-level bad status shared by a whole request
//! ├── PerItemFailure      - one node or attribute failed while siblings succeeded
//! ├── Configuration       - invalid settings or violated call preconditions
//! └── Io                  - local file or socket errors
//! ```
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use ua_client::error::{UaError, WaitOutcome};
//!
//! let error = UaError::timeout("reverse connection", Duration::from_secs(20), WaitOutcome::Elapsed);
//! assert_eq!(error.category(), "timeout");
//! assert_eq!(error.error_code().to_string(), "UA-0401");
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::StatusCode;

// =============================================================================
// UaError
// =============================================================================

/// The main error type of the crate.
#[derive(Debug, Error)]
pub enum UaError {
    /// No endpoint on the target matches the requested security combination.
    #[error("No endpoint at '{url}' matches {requested}")]
    EndpointNotFound {
        /// Discovery URL that was queried.
        url: String,
        /// Human readable form of the security request.
        requested: String,
    },

    /// The application certificate is missing or unusable, or a server
    /// certificate was rejected.
    #[error("{0}")]
    CertificateInvalid(#[from] CertificateError),

    /// Discovery, rendezvous or session creation could not complete.
    #[error("Connection to '{target}' failed: {reason}")]
    ConnectionFailed {
        /// Target URL.
        target: String,
        /// Failure description.
        reason: String,
    },

    /// A bounded wait ended without a result.
    #[error("Timed out waiting for {operation} after {waited:?} ({outcome})")]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// Configured wait budget.
        waited: Duration,
        /// Whether the budget elapsed or the caller cancelled.
        outcome: WaitOutcome,
    },

    /// The server rejected a whole request.
    #[error("Service '{service}' failed with {status}")]
    ServiceFailure {
        /// Service name (Browse, Read, HistoryRead, ...).
        service: &'static str,
        /// Service-level status code.
        status: StatusCode,
    },

    /// One item of a batch failed.
    #[error("Item {index} ({node}) failed with {status}: {message}")]
    PerItemFailure {
        /// Index of the item in the request.
        index: usize,
        /// Node the item refers to.
        node: String,
        /// Item status code.
        status: StatusCode,
        /// Failure description.
        message: String,
    },

    /// Invalid configuration or call precondition.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Local I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Context of the failed operation.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl UaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an endpoint-not-found error.
    pub fn endpoint_not_found(url: impl Into<String>, requested: impl fmt::Display) -> Self {
        Self::EndpointNotFound {
            url: url.into(),
            requested: requested.to_string(),
        }
    }

    /// Creates a connection failure.
    pub fn connection_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, waited: Duration, outcome: WaitOutcome) -> Self {
        Self::Timeout {
            operation: operation.into(),
            waited,
            outcome,
        }
    }

    /// Creates a service failure.
    pub fn service_failure(service: &'static str, status: StatusCode) -> Self {
        Self::ServiceFailure { service, status }
    }

    /// Creates a per-item failure.
    pub fn per_item(
        index: usize,
        node: impl Into<String>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self::PerItemFailure {
            index,
            node: node.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates an I/O error with context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a caller-side retry may succeed.
    ///
    /// The crate never retries internally; this is a hint for outer layers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::ServiceFailure { status, .. } | Self::PerItemFailure { status, .. } => {
                status.is_transient()
            }
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            Self::EndpointNotFound { .. }
            | Self::CertificateInvalid(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Returns the suggested delay before a retry, or `None` if not retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        if !self.is_retryable() {
            return None;
        }
        match self {
            Self::Timeout { .. } => Some(Duration::from_millis(500)),
            Self::ConnectionFailed { .. } => Some(Duration::from_secs(2)),
            _ => Some(Duration::from_secs(1)),
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { outcome, .. } => match outcome {
                WaitOutcome::Cancelled => ErrorSeverity::Info,
                WaitOutcome::Elapsed => ErrorSeverity::Warning,
            },
            Self::PerItemFailure { .. } => ErrorSeverity::Warning,
            Self::EndpointNotFound { .. }
            | Self::ConnectionFailed { .. }
            | Self::ServiceFailure { .. }
            | Self::Io { .. } => ErrorSeverity::Error,
            Self::CertificateInvalid(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::EndpointNotFound { .. } => "endpoint",
            Self::CertificateInvalid(_) => "certificate",
            Self::ConnectionFailed { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::ServiceFailure { .. } => "service",
            Self::PerItemFailure { .. } => "item",
            Self::Configuration(_) => "configuration",
            Self::Io { .. } => "io",
        }
    }

    /// Returns a structured error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::EndpointNotFound { .. } => ErrorCode::new(1, 1),
            Self::CertificateInvalid(e) => e.error_code(),
            Self::ConnectionFailed { .. } => ErrorCode::new(3, 1),
            Self::Timeout { outcome, .. } => match outcome {
                WaitOutcome::Elapsed => ErrorCode::new(4, 1),
                WaitOutcome::Cancelled => ErrorCode::new(4, 2),
            },
            Self::ServiceFailure { .. } => ErrorCode::new(5, 1),
            Self::PerItemFailure { .. } => ErrorCode::new(6, 1),
            Self::Configuration(e) => e.error_code(),
            Self::Io { .. } => ErrorCode::new(8, 1),
        }
    }

    /// Returns the OPC UA status code closest to this error.
    ///
    /// Used to fill per-node failure slots when a whole batch fails.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EndpointNotFound { .. } => StatusCode::BAD_SECURITY_POLICY_REJECTED,
            Self::CertificateInvalid(e) => e.status_code(),
            Self::ConnectionFailed { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
            Self::Timeout { outcome, .. } => match outcome {
                WaitOutcome::Elapsed => StatusCode::BAD_TIMEOUT,
                WaitOutcome::Cancelled => StatusCode::BAD_REQUEST_CANCELLED_BY_CLIENT,
            },
            Self::ServiceFailure { status, .. } | Self::PerItemFailure { status, .. } => *status,
            Self::Configuration(_) => StatusCode::BAD_CONFIGURATION_ERROR,
            Self::Io { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::EndpointNotFound { .. } => vec![
                "List the server endpoints and compare security mode and policy",
                "Request the highest available security instead of an exact pair",
            ],
            Self::CertificateInvalid(e) => e.recovery_hints(),
            Self::ConnectionFailed { .. } => vec![
                "Check that the server is running and reachable",
                "Check firewall rules for the endpoint port",
            ],
            Self::Timeout { outcome, .. } => match outcome {
                WaitOutcome::Elapsed => vec![
                    "Check that the server is configured to dial this client",
                    "Increase reverse_connect.wait_timeout",
                ],
                WaitOutcome::Cancelled => vec!["The wait was cancelled by the caller"],
            },
            Self::ServiceFailure { .. } => vec![
                "Check the service status code on the server side",
                "Reduce the number of nodes per request",
            ],
            Self::PerItemFailure { .. } => vec!["Check that the node exists and is readable"],
            Self::Configuration(e) => e.recovery_hints(),
            Self::Io { .. } => vec!["Check file permissions and paths"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with its level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// WaitOutcome
// =============================================================================

/// How a bounded wait ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitOutcome {
    /// The configured wait budget elapsed.
    Elapsed,
    /// The caller's cancellation fired first.
    Cancelled,
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elapsed => write!(f, "elapsed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// CertificateError
// =============================================================================

/// Application and server certificate failures.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// No certificate file exists at the expected location.
    #[error("Application certificate not found at '{path}'")]
    NotFound {
        /// Expected certificate path.
        path: PathBuf,
    },

    /// The certificate file could not be read.
    #[error("Failed to read certificate '{path}': {source}")]
    Unreadable {
        /// Certificate path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The certificate could not be parsed.
    #[error("Malformed certificate '{path}': {reason}")]
    Malformed {
        /// Certificate path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The certificate is outside its validity window.
    #[error("Certificate '{subject}' is not valid now (valid {not_before} to {not_after})")]
    OutsideValidity {
        /// Certificate subject.
        subject: String,
        /// Start of validity.
        not_before: String,
        /// End of validity.
        not_after: String,
    },

    /// The certificate carries no application URI.
    #[error("Certificate '{subject}' has no application URI in its subject alternative name")]
    MissingApplicationUri {
        /// Certificate subject.
        subject: String,
    },

    /// The private key of the application certificate is missing.
    #[error("Private key not found at '{path}'")]
    PrivateKeyMissing {
        /// Expected key path.
        path: PathBuf,
    },

    /// Security was requested without a configured own certificate.
    #[error("Security requested but no application certificate is configured")]
    NotConfigured,

    /// A server certificate was rejected during validation.
    #[error("Server certificate '{subject}' ({thumbprint}) rejected: {status}")]
    Rejected {
        /// Certificate subject.
        subject: String,
        /// SHA-256 thumbprint.
        thumbprint: String,
        /// Validation status.
        status: StatusCode,
    },
}

impl CertificateError {
    /// Creates a rejection error.
    pub fn rejected(
        subject: impl Into<String>,
        thumbprint: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self::Rejected {
            subject: subject.into(),
            thumbprint: thumbprint.into(),
            status,
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Critical,
        }
    }

    /// Returns a structured error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::NotFound { .. } => 1,
            Self::Unreadable { .. } => 2,
            Self::Malformed { .. } => 3,
            Self::OutsideValidity { .. } => 4,
            Self::MissingApplicationUri { .. } => 5,
            Self::PrivateKeyMissing { .. } => 6,
            Self::NotConfigured => 7,
            Self::Rejected { .. } => 8,
        };
        ErrorCode::new(2, code)
    }

    /// Returns the OPC UA status code equivalent.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OutsideValidity { .. } => StatusCode::BAD_CERTIFICATE_TIME_INVALID,
            Self::MissingApplicationUri { .. } => StatusCode::BAD_CERTIFICATE_URI_INVALID,
            Self::Rejected { status, .. } => *status,
            _ => StatusCode::BAD_CERTIFICATE_INVALID,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::NotFound { .. } | Self::NotConfigured => vec![
                "Place the application certificate under <pki>/own/certs/<subject>.der",
                "Set security.own_certificate to the certificate subject name",
            ],
            Self::Unreadable { .. } | Self::PrivateKeyMissing { .. } => {
                vec!["Check file permissions of the PKI directory"]
            }
            Self::Malformed { .. } => vec!["Re-export the certificate as DER or PEM"],
            Self::OutsideValidity { .. } => vec!["Renew the application certificate"],
            Self::MissingApplicationUri { .. } => {
                vec!["Issue the certificate with a URI subject alternative name"]
            }
            Self::Rejected { .. } => vec![
                "Copy the server certificate into the trusted directory",
                "Supply a trust predicate that accepts this certificate",
            ],
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration and precondition errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A field has an invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Invalid node id text.
    #[error("Invalid node id '{value}': {reason}")]
    InvalidNodeId {
        /// Input text.
        value: String,
        /// Reason.
        reason: String,
    },

    /// Invalid URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Input URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Unknown security mode name.
    #[error("Unknown security mode '{0}'")]
    InvalidSecurityMode(String),

    /// Unknown security policy name or URI.
    #[error("Unknown security policy '{0}'")]
    InvalidSecurityPolicy(String),

    /// A non-anonymous identity was supplied without message security.
    #[error("{token_type} identity requires security; use an anonymous identity or enable security")]
    IdentityRequiresSecurity {
        /// Identity token kind.
        token_type: &'static str,
    },

    /// Failed to parse a configuration document.
    #[error("Failed to parse config '{path}': {message}")]
    Parse {
        /// Source path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A blocking call was made from inside an async runtime.
    #[error("Blocking call '{operation}' cannot run inside an async runtime; use the async variant")]
    BlockingInRuntime {
        /// Operation name.
        operation: &'static str,
    },

    /// The requested feature is not available in this build or runtime.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ConfigurationError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns a structured error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::InvalidValue { .. } => 1,
            Self::MissingField { .. } => 2,
            Self::InvalidNodeId { .. } => 3,
            Self::InvalidUrl { .. } => 4,
            Self::InvalidSecurityMode(_) => 5,
            Self::InvalidSecurityPolicy(_) => 6,
            Self::IdentityRequiresSecurity { .. } => 7,
            Self::Parse { .. } => 8,
            Self::BlockingInRuntime { .. } => 9,
            Self::Unsupported(_) => 10,
        };
        ErrorCode::new(7, code)
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidNodeId { .. } => vec![
                "Use the format ns=<index>;i=<number> or ns=<index>;s=<name>",
            ],
            Self::InvalidUrl { .. } => vec!["Use the format opc.tcp://host:port/path"],
            Self::IdentityRequiresSecurity { .. } => {
                vec!["Enable security so credentials are encrypted on the wire"]
            }
            Self::BlockingInRuntime { .. } => vec!["Call the async variant and await it"],
            Self::Parse { .. } => vec!["Check the configuration file syntax"],
            _ => vec!["Check the configuration values"],
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Action may be required.
    Warning,
    /// Action required, recoverable.
    Error,
    /// Immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `UA-XXYY` where XX is the category and YY the specific error.
///
/// Categories:
/// - 1: Endpoint
/// - 2: Certificate
/// - 3: Connection
/// - 4: Timeout
/// - 5: Service
/// - 6: Item
/// - 7: Configuration
/// - 8: I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with [`UaError`].
pub type UaResult<T> = Result<T, UaError>;

// =============================================================================
// Error Context Extension
// =============================================================================

/// Extension trait for attaching context to errors in logs.
pub trait UaErrorContext<T> {
    /// Logs the error with endpoint context.
    fn with_endpoint(self, endpoint: &str) -> UaResult<T>;

    /// Logs the error with node context.
    fn with_node(self, node_id: &str) -> UaResult<T>;
}

impl<T> UaErrorContext<T> for UaResult<T> {
    fn with_endpoint(self, endpoint: &str) -> UaResult<T> {
        self.map_err(|e| {
            tracing::debug!(endpoint = endpoint, error = %e, "UA error with endpoint context");
            e
        })
    }

    fn with_node(self, node_id: &str) -> UaResult<T> {
        self.map_err(|e| {
            tracing::debug!(node_id = node_id, error = %e, "UA error with node context");
            e
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_and_cancel_share_kind() {
        let elapsed = UaError::timeout("reverse connection", Duration::from_secs(20), WaitOutcome::Elapsed);
        let cancelled =
            UaError::timeout("reverse connection", Duration::from_secs(20), WaitOutcome::Cancelled);

        assert_eq!(elapsed.category(), cancelled.category());
        assert_ne!(elapsed.error_code(), cancelled.error_code());
        assert_eq!(elapsed.status_code(), StatusCode::BAD_TIMEOUT);
        assert!(elapsed.to_string().contains("elapsed"));
        assert!(cancelled.to_string().contains("cancelled"));
    }

    #[test]
    fn test_retryable() {
        assert!(UaError::connection_failed("opc.tcp://a:4840", "refused").is_retryable());
        assert!(!UaError::endpoint_not_found("opc.tcp://a:4840", "None/None").is_retryable());
        assert!(!UaError::from(CertificateError::NotConfigured).is_retryable());
        assert!(UaError::service_failure("Read", StatusCode::BAD_TOO_MANY_OPERATIONS).is_retryable());
        assert!(!UaError::service_failure("Read", StatusCode::BAD_NODE_ID_UNKNOWN).is_retryable());
    }

    #[test]
    fn test_suggested_retry_delay() {
        let error = UaError::connection_failed("opc.tcp://a:4840", "refused");
        assert_eq!(error.suggested_retry_delay(), Some(Duration::from_secs(2)));

        let error = UaError::configuration(ConfigurationError::missing_field("pki_dir"));
        assert!(error.suggested_retry_delay().is_none());
    }

    #[test]
    fn test_error_code_display() {
        let code = ErrorCode::new(2, 8);
        assert_eq!(code.to_string(), "UA-0208");
        assert_eq!(code.as_u16(), 0x0208);

        let error = UaError::from(CertificateError::rejected(
            "CN=server",
            "ab12",
            StatusCode::BAD_CERTIFICATE_UNTRUSTED,
        ));
        assert_eq!(error.error_code(), code);
        assert_eq!(error.status_code(), StatusCode::BAD_CERTIFICATE_UNTRUSTED);
    }

    #[test]
    fn test_severity() {
        let error = UaError::configuration(ConfigurationError::IdentityRequiresSecurity {
            token_type: "UserName",
        });
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.tracing_level(), Level::ERROR);

        let error = UaError::per_item(1, "ns=2;s=A", StatusCode::BAD_NODE_ID_UNKNOWN, "unknown");
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_recovery_hints() {
        let error = UaError::configuration(ConfigurationError::invalid_node_id("x", "bad"));
        assert!(error.recovery_hints().iter().any(|h| h.contains("ns=")));
    }
}
