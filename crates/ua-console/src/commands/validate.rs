// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use ua_client::config::{ClientConfig, ConfigLoader};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{ConsoleError, ConsoleResult};

/// Validates the configuration file and prints a summary.
pub fn validate(cli: &Cli, args: &ValidateArgs) -> ConsoleResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(ConsoleError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = ConfigLoader::new()
        .load(config_path)
        .map_err(|e| ConsoleError::config(format!("Configuration validation failed: {}", e)))?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Application: {}", config.application_name);
            println!("  Application URI: {}", config.effective_application_uri());
            println!("  Session timeout: {}", humantime::format_duration(config.session_timeout));
            println!(
                "  Reverse connect: {}",
                config
                    .reverse_connect
                    .client_endpoint_url
                    .as_deref()
                    .unwrap_or("disabled")
            );
            println!(
                "  Certificate: {}",
                config
                    .security
                    .own_certificate_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            println!(
                "  Max rounds: {}",
                config
                    .paging
                    .max_rounds
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unbounded".to_string())
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "application_name": config.application_name,
                    "application_uri": config.effective_application_uri(),
                    "reverse_connect": config.reverse_connect.client_endpoint_url,
                    "secured": config.security.own_certificate_path().is_some(),
                    "max_rounds": config.paging.max_rounds,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(ConsoleError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Returns settings that load but are likely mistakes.
pub(crate) fn collect_warnings(config: &ClientConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let security = &config.security;

    match security.own_certificate_path() {
        None => warnings.push("No application certificate; only unsecured sessions are possible".to_string()),
        Some(path) if !path.exists() => {
            warnings.push(format!("Application certificate not found: {}", path.display()))
        }
        Some(_) => {}
    }

    if let Some(trusted) = security.effective_trusted_dir() {
        if !trusted.is_dir() {
            warnings.push(format!("Trusted certificate directory does not exist: {}", trusted.display()));
        }
    }

    if security.insecure_accept_untrusted {
        warnings.push("Every untrusted server certificate is accepted".to_string());
    } else if security.auto_accept_untrusted {
        warnings.push("Untrusted server certificates are accepted automatically".to_string());
    }

    if config.paging.max_rounds.is_none() {
        warnings.push("Continuation rounds are unbounded".to_string());
    }

    warnings
}
