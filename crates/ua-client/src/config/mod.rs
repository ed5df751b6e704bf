// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! Durations are written as humantime strings (`"15s"`, `"1m"`). Every field
//! has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! application_name = "line-monitor"
//! operation_timeout = "15s"
//!
//! [reverse_connect]
//! client_endpoint_url = "opc.tcp://0.0.0.0:65300"
//! wait_timeout = "20s"
//!
//! [security]
//! pki_dir = "pki"
//! own_certificate = "line-monitor"
//! ```

mod loader;

pub use loader::{ConfigFormat, ConfigLoader, ConfigLoaderBuilder};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaError, UaResult};

// =============================================================================
// ClientConfig
// =============================================================================

/// Client application configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ua_client::config::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .application_name("line-monitor")
///     .operation_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.session_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name announced to servers.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI; taken from the certificate when security is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Product URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,

    /// Timeout for a single service call.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Session idle timeout requested from the server.
    #[serde(default = "default_session_timeout")]
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Session name for direct connections.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Reverse connect settings.
    #[serde(default)]
    pub reverse_connect: ReverseConnectConfig,

    /// Certificate settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Continuation point settings.
    #[serde(default)]
    pub paging: PagingConfig,
}

fn default_application_name() -> String {
    "ua-client".to_string()
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_session_name() -> String {
    "ua-client session".to_string()
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> UaResult<()> {
        if self.application_name.trim().is_empty() {
            return Err(ConfigurationError::missing_field("application_name").into());
        }

        if self.operation_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "operation_timeout",
                "must be greater than 0",
            )
            .into());
        }

        if self.session_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "session_timeout",
                "must be greater than 0",
            )
            .into());
        }

        if let Some(url) = &self.reverse_connect.client_endpoint_url {
            if !url.starts_with("opc.tcp://") {
                return Err(ConfigurationError::invalid_url(
                    url,
                    "reverse connect listens on opc.tcp only",
                )
                .into());
            }
        }

        if self.paging.max_rounds == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "paging.max_rounds",
                "must be at least 1 when set",
            )
            .into());
        }

        if self.security.insecure_accept_untrusted {
            tracing::warn!(
                application = %self.application_name,
                "Insecure mode: every untrusted server certificate will be accepted"
            );
        }

        Ok(())
    }

    /// Returns the configured application URI or one derived from the name.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri.clone().unwrap_or_else(|| {
            format!("urn:ua-client:{}", self.application_name.replace(' ', ""))
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: None,
            product_uri: None,
            operation_timeout: default_operation_timeout(),
            session_timeout: default_session_timeout(),
            session_name: default_session_name(),
            reverse_connect: ReverseConnectConfig::default(),
            security: SecurityConfig::default(),
            paging: PagingConfig::default(),
        }
    }
}

// =============================================================================
// ReverseConnectConfig
// =============================================================================

/// Reverse connect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseConnectConfig {
    /// URL the client listens on for servers dialing in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_endpoint_url: Option<String>,

    /// How long to wait for a server to dial in; zero falls back to 20 s.
    #[serde(default = "default_reverse_wait_timeout")]
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,

    /// Session name for reverse connections.
    #[serde(default = "default_reverse_session_name")]
    pub reverse_session_name: String,

    /// Listen backlog of the reverse connect socket.
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,

    /// Only match waiters whose server URI equals the one the server reports.
    #[serde(default)]
    pub strict_server_uri: bool,
}

/// Wait timeout used when none is configured.
pub const DEFAULT_REVERSE_WAIT_TIMEOUT: Duration = Duration::from_secs(20);

fn default_reverse_wait_timeout() -> Duration {
    DEFAULT_REVERSE_WAIT_TIMEOUT
}

fn default_reverse_session_name() -> String {
    "NSS".to_string()
}

fn default_listen_backlog() -> u32 {
    16
}

impl ReverseConnectConfig {
    /// Returns the wait timeout, falling back to the default when zero.
    pub fn effective_wait_timeout(&self) -> Duration {
        if self.wait_timeout.is_zero() {
            DEFAULT_REVERSE_WAIT_TIMEOUT
        } else {
            self.wait_timeout
        }
    }
}

impl Default for ReverseConnectConfig {
    fn default() -> Self {
        Self {
            client_endpoint_url: None,
            wait_timeout: default_reverse_wait_timeout(),
            reverse_session_name: default_reverse_session_name(),
            listen_backlog: default_listen_backlog(),
            strict_server_uri: false,
        }
    }
}

// =============================================================================
// SecurityConfig
// =============================================================================

/// Certificate store settings.
///
/// The PKI directory follows the usual layout:
///
/// ```text
/// <pki_dir>/own/certs/<subject>.der
/// <pki_dir>/own/private/<subject>.pem
/// <pki_dir>/trusted/certs/
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// Root of the certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<PathBuf>,

    /// Subject name of the application certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_certificate: Option<String>,

    /// Private key path; defaults to `<pki>/own/private/<subject>.pem`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// Trusted peers directory; defaults to `<pki>/trusted/certs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_dir: Option<PathBuf>,

    /// Accept untrusted server certificates without consulting a predicate.
    #[serde(default)]
    pub auto_accept_untrusted: bool,

    /// Accept untrusted server certificates when no predicate decides.
    ///
    /// Insecure. Intended for lab setups only.
    #[serde(default)]
    pub insecure_accept_untrusted: bool,
}

impl SecurityConfig {
    /// Returns the expected path of the application certificate.
    pub fn own_certificate_path(&self) -> Option<PathBuf> {
        let pki = self.pki_dir.as_ref()?;
        let subject = self.own_certificate.as_ref()?;
        Some(pki.join("own").join("certs").join(format!("{}.der", subject)))
    }

    /// Returns the private key path.
    pub fn effective_private_key_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.private_key_path {
            return Some(path.clone());
        }
        let pki = self.pki_dir.as_ref()?;
        let subject = self.own_certificate.as_ref()?;
        Some(pki.join("own").join("private").join(format!("{}.pem", subject)))
    }

    /// Returns the trusted peers directory.
    pub fn effective_trusted_dir(&self) -> Option<PathBuf> {
        self.trusted_dir
            .clone()
            .or_else(|| self.pki_dir.as_ref().map(|pki| pki.join("trusted").join("certs")))
    }
}

// =============================================================================
// PagingConfig
// =============================================================================

/// Continuation point settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PagingConfig {
    /// Maximum number of continuation rounds per operation; unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    /// References per browse round; 0 lets the server choose.
    #[serde(default)]
    pub browse_max_references_per_round: u32,
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    application_name: Option<String>,
    application_uri: Option<String>,
    product_uri: Option<String>,
    operation_timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    session_name: Option<String>,
    reverse_connect: Option<ReverseConnectConfig>,
    security: Option<SecurityConfig>,
    paging: Option<PagingConfig>,
}

impl ClientConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.application_uri = Some(uri.into());
        self
    }

    /// Sets the product URI.
    pub fn product_uri(mut self, uri: impl Into<String>) -> Self {
        self.product_uri = Some(uri.into());
        self
    }

    /// Sets the operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Sets the reverse connect settings.
    pub fn reverse_connect(mut self, settings: ReverseConnectConfig) -> Self {
        self.reverse_connect = Some(settings);
        self
    }

    /// Sets the listening URL for reverse connect.
    pub fn client_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.reverse_connect
            .get_or_insert_with(ReverseConnectConfig::default)
            .client_endpoint_url = Some(url.into());
        self
    }

    /// Sets the reverse connect wait timeout.
    pub fn reverse_wait_timeout(mut self, timeout: Duration) -> Self {
        self.reverse_connect
            .get_or_insert_with(ReverseConnectConfig::default)
            .wait_timeout = timeout;
        self
    }

    /// Sets the certificate settings.
    pub fn security(mut self, settings: SecurityConfig) -> Self {
        self.security = Some(settings);
        self
    }

    /// Sets the PKI directory and application certificate subject.
    pub fn pki(mut self, pki_dir: impl Into<PathBuf>, own_certificate: impl Into<String>) -> Self {
        let security = self.security.get_or_insert_with(SecurityConfig::default);
        security.pki_dir = Some(pki_dir.into());
        security.own_certificate = Some(own_certificate.into());
        self
    }

    /// Sets whether untrusted server certificates are accepted automatically.
    pub fn auto_accept_untrusted(mut self, accept: bool) -> Self {
        self.security
            .get_or_insert_with(SecurityConfig::default)
            .auto_accept_untrusted = accept;
        self
    }

    /// Sets the paging settings.
    pub fn paging(mut self, settings: PagingConfig) -> Self {
        self.paging = Some(settings);
        self
    }

    /// Sets the continuation round cap.
    pub fn max_rounds(mut self, rounds: u32) -> Self {
        self.paging.get_or_insert_with(PagingConfig::default).max_rounds = Some(rounds);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ClientConfig, UaError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            application_name: self.application_name.unwrap_or(defaults.application_name),
            application_uri: self.application_uri,
            product_uri: self.product_uri,
            operation_timeout: self.operation_timeout.unwrap_or(defaults.operation_timeout),
            session_timeout: self.session_timeout.unwrap_or(defaults.session_timeout),
            session_name: self.session_name.unwrap_or(defaults.session_name),
            reverse_connect: self.reverse_connect.unwrap_or_default(),
            security: self.security.unwrap_or_default(),
            paging: self.paging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Serde helpers
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.application_name, "ua-client");
        assert_eq!(config.operation_timeout, Duration::from_secs(15));
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.reverse_connect.wait_timeout, Duration::from_secs(20));
        assert_eq!(config.reverse_connect.reverse_session_name, "NSS");
        assert!(!config.security.auto_accept_untrusted);
        assert!(!config.security.insecure_accept_untrusted);
        assert!(config.paging.max_rounds.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_wait_timeout_falls_back() {
        let settings = ReverseConnectConfig {
            wait_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(settings.effective_wait_timeout(), DEFAULT_REVERSE_WAIT_TIMEOUT);

        let settings = ReverseConnectConfig {
            wait_timeout: Duration::from_secs(3),
            ..Default::default()
        };
        assert_eq!(settings.effective_wait_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_builder_validation() {
        assert!(ClientConfig::builder()
            .operation_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(ClientConfig::builder().max_rounds(0).build().is_err());
        assert!(ClientConfig::builder()
            .client_endpoint_url("http://localhost:65300")
            .build()
            .is_err());

        let config = ClientConfig::builder()
            .client_endpoint_url("opc.tcp://localhost:65300")
            .max_rounds(4)
            .build()
            .unwrap();
        assert_eq!(config.paging.max_rounds, Some(4));
    }

    #[test]
    fn test_pki_paths() {
        let security = SecurityConfig {
            pki_dir: Some(PathBuf::from("/var/pki")),
            own_certificate: Some("monitor".to_string()),
            ..Default::default()
        };
        assert_eq!(
            security.own_certificate_path(),
            Some(PathBuf::from("/var/pki/own/certs/monitor.der"))
        );
        assert_eq!(
            security.effective_private_key_path(),
            Some(PathBuf::from("/var/pki/own/private/monitor.pem"))
        );
        assert_eq!(
            security.effective_trusted_dir(),
            Some(PathBuf::from("/var/pki/trusted/certs"))
        );
        assert!(SecurityConfig::default().own_certificate_path().is_none());
    }

    #[test]
    fn test_humantime_round_trip_through_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            operation_timeout = "5s"

            [reverse_connect]
            wait_timeout = "1m"
            "#,
        )
        .unwrap();
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
        assert_eq!(config.reverse_connect.wait_timeout, Duration::from_secs(60));
        assert_eq!(config.session_name, "ua-client session");

        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("operation_timeout = \"5s\""));
    }
}
