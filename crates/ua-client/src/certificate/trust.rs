// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Trust decisions on server certificates.
//!
//! Only the "untrusted" failure is decided here. Any other validation
//! failure is rejected and surfaces from session establishment.
//!
//! Decision order for an untrusted certificate:
//!
//! 1. `security.auto_accept_untrusted` accepts
//! 2. a [`TrustPolicy::Predicate`] decides
//! 3. [`TrustPolicy::InsecureAcceptAll`] or `security.insecure_accept_untrusted` accepts
//! 4. otherwise reject

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::CertificateInfo;
use crate::config::SecurityConfig;
use crate::error::CertificateError;
use crate::telemetry::Telemetry;
use crate::types::StatusCode;

// =============================================================================
// Validation Events
// =============================================================================

/// Why the runtime could not validate a server certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The certificate chain is not in the trust list.
    Untrusted,
    /// Outside its validity window.
    TimeInvalid,
    /// Host name does not match.
    HostNameInvalid,
    /// Application URI does not match.
    UriInvalid,
    /// Revoked.
    Revoked,
    /// Revocation status unknown.
    RevocationUnknown,
    /// Any other failure.
    Other(StatusCode),
}

impl ValidationFailure {
    /// Maps a validation status code.
    pub fn from_status(status: StatusCode) -> Self {
        match StatusCode(status.code()) {
            StatusCode::BAD_CERTIFICATE_UNTRUSTED => Self::Untrusted,
            StatusCode::BAD_CERTIFICATE_TIME_INVALID => Self::TimeInvalid,
            StatusCode::BAD_CERTIFICATE_HOST_NAME_INVALID => Self::HostNameInvalid,
            StatusCode::BAD_CERTIFICATE_URI_INVALID => Self::UriInvalid,
            StatusCode::BAD_CERTIFICATE_REVOKED => Self::Revoked,
            StatusCode::BAD_CERTIFICATE_REVOCATION_UNKNOWN => Self::RevocationUnknown,
            other => Self::Other(other),
        }
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Untrusted => StatusCode::BAD_CERTIFICATE_UNTRUSTED,
            Self::TimeInvalid => StatusCode::BAD_CERTIFICATE_TIME_INVALID,
            Self::HostNameInvalid => StatusCode::BAD_CERTIFICATE_HOST_NAME_INVALID,
            Self::UriInvalid => StatusCode::BAD_CERTIFICATE_URI_INVALID,
            Self::Revoked => StatusCode::BAD_CERTIFICATE_REVOKED,
            Self::RevocationUnknown => StatusCode::BAD_CERTIFICATE_REVOCATION_UNKNOWN,
            Self::Other(status) => *status,
        }
    }
}

/// One failed validation of a server certificate.
#[derive(Debug, Clone)]
pub struct CertificateValidationEvent {
    /// The server certificate.
    pub certificate: CertificateInfo,
    /// What failed.
    pub failure: ValidationFailure,
}

/// Decides on server certificates that failed validation.
pub trait CertificateValidator: Send + Sync {
    /// Returns `true` to accept the certificate.
    fn accept(&self, event: &CertificateValidationEvent) -> bool;
}

// =============================================================================
// TrustPolicy
// =============================================================================

/// Caller policy for untrusted server certificates.
#[derive(Clone, Default)]
pub enum TrustPolicy {
    /// Reject unless auto-accept is configured.
    #[default]
    Strict,
    /// Accept when the predicate returns `true`.
    Predicate(Arc<dyn Fn(&CertificateInfo) -> bool + Send + Sync>),
    /// Accept every untrusted certificate. Insecure.
    InsecureAcceptAll,
}

impl TrustPolicy {
    /// Creates a predicate policy.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&CertificateInfo) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Accepts certificates whose thumbprint is listed.
    pub fn thumbprints<I, S>(thumbprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: Vec<String> = thumbprints
            .into_iter()
            .map(|t| t.into().to_lowercase())
            .collect();
        Self::predicate(move |cert| allowed.iter().any(|t| *t == cert.thumbprint))
    }
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
            Self::InsecureAcceptAll => write!(f, "InsecureAcceptAll"),
        }
    }
}

// =============================================================================
// TrustGate
// =============================================================================

/// Trust decision scoped to one establishment call.
pub struct TrustGate<'a> {
    policy: &'a TrustPolicy,
    auto_accept: bool,
    insecure_fallback: bool,
    telemetry: &'a Telemetry,
}

impl<'a> TrustGate<'a> {
    /// Creates a gate from a caller policy and the configured flags.
    pub fn new(policy: &'a TrustPolicy, security: &SecurityConfig, telemetry: &'a Telemetry) -> Self {
        Self {
            policy,
            auto_accept: security.auto_accept_untrusted,
            insecure_fallback: security.insecure_accept_untrusted,
            telemetry,
        }
    }

    /// Decides on one event and logs the decision.
    pub fn decide(&self, event: &CertificateValidationEvent) -> bool {
        let cert = &event.certificate;

        let (accepted, reason) = if event.failure != ValidationFailure::Untrusted {
            (false, "validation failure is not resolvable")
        } else if self.auto_accept {
            (true, "auto accept")
        } else {
            match self.policy {
                TrustPolicy::Predicate(predicate) => (predicate(cert), "predicate"),
                TrustPolicy::InsecureAcceptAll => (true, "insecure accept all"),
                TrustPolicy::Strict if self.insecure_fallback => (true, "insecure fallback"),
                TrustPolicy::Strict => (false, "not trusted"),
            }
        };

        self.telemetry.record_certificate_decision(accepted);
        if accepted {
            info!(
                subject = %cert.subject,
                thumbprint = %cert.thumbprint,
                reason,
                "Accepted server certificate"
            );
        } else {
            warn!(
                subject = %cert.subject,
                thumbprint = %cert.thumbprint,
                failure = %event.failure.status_code(),
                reason,
                "Rejected server certificate"
            );
        }
        accepted
    }

    /// Decides on one event, returning a rejection error.
    pub fn check(&self, event: &CertificateValidationEvent) -> Result<(), CertificateError> {
        if self.decide(event) {
            Ok(())
        } else {
            Err(CertificateError::rejected(
                &event.certificate.subject,
                &event.certificate.thumbprint,
                event.failure.status_code(),
            ))
        }
    }
}

impl CertificateValidator for TrustGate<'_> {
    fn accept(&self, event: &CertificateValidationEvent) -> bool {
        self.decide(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::fixtures::MONITOR_DER;

    fn event(failure: ValidationFailure) -> CertificateValidationEvent {
        CertificateValidationEvent {
            certificate: CertificateInfo::parse(MONITOR_DER).unwrap(),
            failure,
        }
    }

    fn security(auto_accept: bool, insecure: bool) -> SecurityConfig {
        SecurityConfig {
            auto_accept_untrusted: auto_accept,
            insecure_accept_untrusted: insecure,
            ..Default::default()
        }
    }

    #[test]
    fn test_strict_rejects_by_default() {
        let telemetry = Telemetry::new("test");
        let policy = TrustPolicy::default();
        let gate = TrustGate::new(&policy, &security(false, false), &telemetry);

        let error = gate.check(&event(ValidationFailure::Untrusted)).unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_CERTIFICATE_UNTRUSTED);
        assert_eq!(telemetry.snapshot().certificates_rejected, 1);
    }

    #[test]
    fn test_auto_accept_precedes_predicate() {
        let telemetry = Telemetry::new("test");
        let policy = TrustPolicy::predicate(|_| false);

        let gate = TrustGate::new(&policy, &security(true, false), &telemetry);
        assert!(gate.accept(&event(ValidationFailure::Untrusted)));

        let gate = TrustGate::new(&policy, &security(false, false), &telemetry);
        assert!(!gate.accept(&event(ValidationFailure::Untrusted)));
    }

    #[test]
    fn test_predicate_sees_certificate() {
        let telemetry = Telemetry::new("test");
        let policy = TrustPolicy::thumbprints([
            "6A44C32293BA937A43491A56BFD70D965954C88664B83429DE92B99ED5E45F3D",
        ]);
        let gate = TrustGate::new(&policy, &security(false, false), &telemetry);
        assert!(gate.decide(&event(ValidationFailure::Untrusted)));
    }

    #[test]
    fn test_only_untrusted_is_resolved() {
        let telemetry = Telemetry::new("test");
        let policy = TrustPolicy::InsecureAcceptAll;
        let gate = TrustGate::new(&policy, &security(true, true), &telemetry);

        assert!(!gate.decide(&event(ValidationFailure::TimeInvalid)));
        assert!(!gate.decide(&event(ValidationFailure::Revoked)));
        assert!(gate.decide(&event(ValidationFailure::Untrusted)));
    }

    #[test]
    fn test_insecure_modes_are_explicit() {
        let telemetry = Telemetry::new("test");

        let policy = TrustPolicy::InsecureAcceptAll;
        let gate = TrustGate::new(&policy, &security(false, false), &telemetry);
        assert!(gate.decide(&event(ValidationFailure::Untrusted)));

        let policy = TrustPolicy::Strict;
        let gate = TrustGate::new(&policy, &security(false, true), &telemetry);
        assert!(gate.decide(&event(ValidationFailure::Untrusted)));
    }

    #[test]
    fn test_failure_status_mapping() {
        assert_eq!(
            ValidationFailure::from_status(StatusCode::BAD_CERTIFICATE_UNTRUSTED),
            ValidationFailure::Untrusted
        );
        assert_eq!(
            ValidationFailure::from_status(StatusCode::BAD_SECURITY_CHECKS_FAILED),
            ValidationFailure::Other(StatusCode::BAD_SECURITY_CHECKS_FAILED)
        );
    }
}
