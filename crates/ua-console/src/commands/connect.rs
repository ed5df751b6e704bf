// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and the session lifecycle of online commands.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ua_client::config::{ClientConfig, ConfigLoader};
use ua_client::runtime::UaRuntime;
use ua_client::{SessionFactory, Telemetry};

use super::{browse, history, read};
use crate::cli::{Cli, Commands, ConnectArgs, HistoryCommand};
use crate::error::{ConsoleError, ConsoleResult};

/// Loads the configuration file, or the defaults when it does not exist.
pub fn load_config(cli: &Cli) -> ConsoleResult<ClientConfig> {
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "No configuration file, using defaults");
        return Ok(ClientConfig::default());
    }
    ConfigLoader::new()
        .load(&cli.config)
        .map_err(|e| ConsoleError::from(e).with_context(format!("loading {}", cli.config.display())))
}

/// Runs `read`, `browse` or `history` with the OPC UA runtime.
#[cfg(feature = "opcua-runtime")]
pub(crate) async fn execute_online(cli: &Cli, cancel: &CancellationToken) -> ConsoleResult<()> {
    use ua_client::runtime::opcua::OpcUaRuntime;

    let config = load_config(cli)?;
    let runtime = OpcUaRuntime::new().with_application_name(config.application_name.clone());
    run_session_command(&SessionFactory::new(runtime, config), &cli.command, cancel).await
}

#[cfg(not(feature = "opcua-runtime"))]
pub(crate) async fn execute_online(cli: &Cli, _cancel: &CancellationToken) -> ConsoleResult<()> {
    Err(ConsoleError::config(format!(
        "`{}` opens OPC UA sessions; rebuild with `--features opcua-runtime`",
        cli.command.name()
    )))
}

/// Opens a session for `command`, runs it and closes the session.
///
/// The session is closed whatever the command returned.
pub async fn run_session_command<R: UaRuntime>(
    factory: &SessionFactory<R>,
    command: &Commands,
    cancel: &CancellationToken,
) -> ConsoleResult<()> {
    let connect = connect_args(command)
        .ok_or_else(|| ConsoleError::config(format!("`{}` does not open a session", command.name())))?;
    let telemetry = Telemetry::new(&factory.config().application_name);

    let handle = factory
        .create_session(&connect.session_request(), cancel, &telemetry)
        .await?;
    info!(endpoint = %handle.endpoint(), "Session open");

    let result = match command {
        Commands::Read(args) => read::read(&handle, &telemetry, args).await,
        Commands::Browse(args) => browse::browse(&handle, &telemetry, args).await,
        Commands::History(HistoryCommand::Raw(args)) => history::raw(&handle, &telemetry, args).await,
        Commands::History(HistoryCommand::Processed(args)) => {
            history::processed(&handle, &telemetry, args).await
        }
        Commands::History(HistoryCommand::Events(args)) => history::events(&handle, &telemetry, args).await,
        Commands::Listen(_) | Commands::Validate(_) | Commands::Version => Ok(()),
    };

    if let Err(e) = handle.close().await {
        warn!(error = %e, "Closing session failed");
    }

    let snapshot = telemetry.snapshot();
    info!(
        rounds = snapshot.rounds_issued,
        released = snapshot.continuation_points_released,
        "Command finished"
    );
    result
}

fn connect_args(command: &Commands) -> Option<&ConnectArgs> {
    match command {
        Commands::Read(args) => Some(&args.connect),
        Commands::Browse(args) => Some(&args.connect),
        Commands::History(HistoryCommand::Raw(args)) => Some(&args.connect),
        Commands::History(HistoryCommand::Processed(args)) => Some(&args.connect),
        Commands::History(HistoryCommand::Events(args)) => Some(&args.connect),
        Commands::Listen(_) | Commands::Validate(_) | Commands::Version => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cli = Cli::parse_from(["ua-console", "-c", path.to_str().unwrap(), "version"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.application_name, ClientConfig::default().application_name);
    }

    #[test]
    fn test_config_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "application_name = \"Line 4 historian\"").unwrap();
        writeln!(file, "[paging]").unwrap();
        writeln!(file, "max_rounds = 50").unwrap();
        let cli = Cli::parse_from(["ua-console", "-c", file.path().to_str().unwrap(), "version"]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.application_name, "Line 4 historian");
        assert_eq!(config.paging.max_rounds, Some(50));
    }

    #[test]
    fn test_connect_args_only_for_online_commands() {
        let cli = Cli::parse_from(["ua-console", "browse", "opc.tcp://plc:4840"]);
        assert_eq!(connect_args(&cli.command).map(|c| c.url.as_str()), Some("opc.tcp://plc:4840"));

        let cli = Cli::parse_from(["ua-console", "listen"]);
        assert!(connect_args(&cli.command).is_none());
    }
}
