// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The client's own certificate.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::CertificateInfo;
use crate::config::SecurityConfig;
use crate::error::CertificateError;

/// Application certificate and the URI derived from it.
#[derive(Debug, Clone)]
pub struct ApplicationIdentity {
    /// Subject name the certificate was looked up by.
    pub subject_name: String,
    /// Application URI from the certificate.
    pub application_uri: String,
    /// Parsed certificate.
    pub certificate: CertificateInfo,
    /// Certificate file.
    pub certificate_path: PathBuf,
    /// Private key file.
    pub private_key_path: PathBuf,
    /// Trusted peers directory.
    pub trusted_dir: Option<PathBuf>,
}

impl ApplicationIdentity {
    /// Loads and checks the application certificate.
    ///
    /// Looks for `<pki>/own/certs/<subject>.der`, then the `.pem` sibling.
    /// Fails if the certificate cannot be parsed, is outside its validity
    /// window, carries no application URI, or its private key is missing.
    pub fn load(security: &SecurityConfig) -> Result<Self, CertificateError> {
        let (Some(subject_name), Some(der_path)) =
            (security.own_certificate.clone(), security.own_certificate_path())
        else {
            return Err(CertificateError::NotConfigured);
        };

        let certificate_path = if der_path.exists() {
            der_path
        } else {
            let pem_path = der_path.with_extension("pem");
            if !pem_path.exists() {
                return Err(CertificateError::NotFound { path: der_path });
            }
            pem_path
        };

        let data = fs::read(&certificate_path).map_err(|source| CertificateError::Unreadable {
            path: certificate_path.clone(),
            source,
        })?;
        let certificate =
            CertificateInfo::parse(&data).map_err(|reason| CertificateError::Malformed {
                path: certificate_path.clone(),
                reason,
            })?;

        if !certificate.is_valid_at(Utc::now()) {
            return Err(CertificateError::OutsideValidity {
                subject: certificate.subject.clone(),
                not_before: certificate.not_before.to_rfc3339(),
                not_after: certificate.not_after.to_rfc3339(),
            });
        }

        let private_key_path = security
            .effective_private_key_path()
            .ok_or(CertificateError::NotConfigured)?;
        check_private_key(&private_key_path)?;

        let application_uri = certificate.application_uri.clone().ok_or_else(|| {
            CertificateError::MissingApplicationUri {
                subject: certificate.subject.clone(),
            }
        })?;

        info!(
            subject = %certificate.subject,
            thumbprint = %certificate.thumbprint,
            application_uri = %application_uri,
            "Application certificate loaded"
        );

        Ok(Self {
            subject_name,
            application_uri,
            certificate,
            certificate_path,
            private_key_path,
            trusted_dir: security.effective_trusted_dir(),
        })
    }
}

fn check_private_key(path: &Path) -> Result<(), CertificateError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            debug!(path = %path.display(), "Private key found");
            Ok(())
        }
        Ok(_) => Err(CertificateError::PrivateKeyMissing {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CertificateError::PrivateKeyMissing {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CertificateError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}
