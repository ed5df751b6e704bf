// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Certificate handling.
//!
//! - [`ApplicationIdentity`]: the client's own certificate, loaded fail-closed
//! - [`TrustGate`]: per-call decision on untrusted server certificates
//! - [`CertificateInfo`]: parsed view of a DER certificate

mod identity;
mod trust;

pub use identity::ApplicationIdentity;
pub use trust::{
    CertificateValidationEvent, CertificateValidator, TrustGate, TrustPolicy, ValidationFailure,
};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

/// Parsed certificate details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// SHA-256 thumbprint, lowercase hex.
    pub thumbprint: String,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// First URI entry of the subject alternative name.
    pub application_uri: Option<String>,
    der: Vec<u8>,
}

impl CertificateInfo {
    /// Parses a DER or PEM encoded certificate.
    pub fn parse(data: &[u8]) -> Result<Self, String> {
        if data.starts_with(b"-----BEGIN") {
            let (_, pem) = parse_x509_pem(data).map_err(|e| format!("invalid PEM: {}", e))?;
            return Self::from_der(&pem.contents);
        }
        Self::from_der(data)
    }

    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| format!("invalid X.509 certificate: {}", e))?;

        let application_uri = match cert.subject_alternative_name() {
            Ok(Some(san)) => san.value.general_names.iter().find_map(|name| match name {
                GeneralName::URI(uri) => Some(uri.to_string()),
                _ => None,
            }),
            Ok(None) => None,
            Err(e) => return Err(format!("invalid subject alternative name: {}", e)),
        };

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp())?;
        let not_after = timestamp(validity.not_after.timestamp())?;

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            thumbprint: hex::encode(Sha256::digest(der)),
            not_before,
            not_after,
            application_uri,
            der: der.to_vec(),
        })
    }

    /// Returns `true` if `now` lies within the validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Returns the DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("timestamp {} out of range", secs))
}
