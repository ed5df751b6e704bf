// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the TOML or JSON file
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Apply environment variable overrides
//! 4. Resolve relative PKI paths against the file's directory
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UA_OPERATION_TIMEOUT=30s
//! UA_SESSION_TIMEOUT=2m
//! UA_REVERSE_WAIT_TIMEOUT=45s
//! UA_AUTO_ACCEPT_UNTRUSTED=true
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::ClientConfig;
use crate::error::{CertificateError, ConfigurationError, UaError, UaResult};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`ClientConfig`] documents.
///
/// # Examples
///
/// ```no_run
/// use ua_client::config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("client.toml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    env_prefix: String,
    resolve_env_vars: bool,
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `UA` environment prefix.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "UA".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::default()
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads a configuration without security requirements.
    pub fn load(&self, path: impl AsRef<Path>) -> UaResult<ClientConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading client configuration");

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = fs::read_to_string(path)
            .map_err(|e| UaError::io(format!("reading '{}'", path.display()), e))?;
        let format = ConfigFormat::from_path(path)?;

        let content = if self.resolve_env_vars {
            resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config = format
            .parse(&content)
            .map_err(|message| ConfigurationError::parse(path, message))?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.resolve_paths {
            resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        debug!(
            application = %config.application_name,
            reverse = config.reverse_connect.client_endpoint_url.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads a configuration that must be usable for secure sessions.
    ///
    /// Requires a PKI directory and an application certificate subject.
    pub fn load_secure(&self, path: impl AsRef<Path>) -> UaResult<ClientConfig> {
        let config = self.load(path)?;

        if config.security.pki_dir.is_none() {
            return Err(ConfigurationError::missing_field("security.pki_dir").into());
        }
        if config.security.own_certificate.is_none() {
            return Err(CertificateError::NotConfigured.into());
        }

        Ok(config)
    }

    /// Parses a configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> UaResult<ClientConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config = format
            .parse(&content)
            .map_err(|message| ConfigurationError::parse("<string>", message))?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut ClientConfig) -> UaResult<()> {
        if let Some(value) = self.env_duration("OPERATION_TIMEOUT")? {
            config.operation_timeout = value;
        }
        if let Some(value) = self.env_duration("SESSION_TIMEOUT")? {
            config.session_timeout = value;
        }
        if let Some(value) = self.env_duration("REVERSE_WAIT_TIMEOUT")? {
            config.reverse_connect.wait_timeout = value;
        }
        if let Ok(value) = env::var(self.env_key("AUTO_ACCEPT_UNTRUSTED")) {
            config.security.auto_accept_untrusted = parse_bool(&value);
        }
        if let Ok(value) = env::var(self.env_key("CLIENT_ENDPOINT_URL")) {
            config.reverse_connect.client_endpoint_url = Some(value);
        }
        Ok(())
    }

    fn env_key(&self, name: &str) -> String {
        format!("{}_{}", self.env_prefix, name)
    }

    fn env_duration(&self, name: &str) -> UaResult<Option<Duration>> {
        let key = self.env_key(name);
        match env::var(&key) {
            Ok(value) => humantime::parse_duration(value.trim())
                .map(Some)
                .map_err(|e| ConfigurationError::invalid_value(key, e.to_string()).into()),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for [`ConfigLoader`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    base_path: Option<PathBuf>,
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    resolve_paths: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables path resolution.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = Some(enabled);
        self
    }

    /// Builds the loader.
    pub fn build(self) -> ConfigLoader {
        let defaults = ConfigLoader::new();
        ConfigLoader {
            base_path: self.base_path,
            env_prefix: self.env_prefix.unwrap_or(defaults.env_prefix),
            resolve_env_vars: self.resolve_env_vars.unwrap_or(defaults.resolve_env_vars),
            resolve_paths: self.resolve_paths.unwrap_or(defaults.resolve_paths),
        }
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file extension.
    pub fn from_path(path: &Path) -> UaResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(ConfigurationError::Unsupported(format!(
                "configuration format '{}'",
                other.unwrap_or("<none>")
            ))
            .into()),
        }
    }

    fn parse(self, content: &str) -> Result<ClientConfig, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Replaces `${VAR}` and `${VAR:default}` placeholders.
///
/// Unknown variables without a default are kept verbatim.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next();

        let mut placeholder = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            placeholder.push(c);
        }

        if !closed {
            result.push_str("${");
            result.push_str(&placeholder);
            continue;
        }

        let (name, default) = match placeholder.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (placeholder.as_str(), None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&format!("${{{}}}", name));
            }
        }
    }

    result
}

fn resolve_relative_paths(config: &mut ClientConfig, base_path: &Path) {
    let security = &mut config.security;
    for path in [
        security.pki_dir.as_mut(),
        security.private_key_path.as_mut(),
        security.trusted_dir.as_mut(),
    ]
    .into_iter()
    .flatten()
    {
        if path.is_relative() {
            *path = base_path.join(&*path);
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// =============================================================================
// Tests
// =============================================================================
