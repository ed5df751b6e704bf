// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `read`, `browse`, `history`: open a session, run one batched service, close
//! - `listen`: accept reverse connections without opening sessions
//! - `validate`: check the configuration file
//! - `version`: show version information

mod browse;
mod connect;
mod history;
mod listen;
mod output;
mod read;
mod validate;
mod version;

pub use connect::{load_config, run_session_command};
pub use listen::listen;
pub use validate::validate;
pub use version::version;

use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::error::ConsoleResult;
use crate::shutdown::ShutdownCoordinator;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> ConsoleResult<()> {
    debug!(command = cli.command.name(), config = %cli.config.display(), "Executing command");

    match &cli.command {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::Listen(args) => {
            let shutdown = ShutdownCoordinator::install();
            listen::listen(&cli, args, &shutdown.token()).await
        }
        Commands::Read(_) | Commands::Browse(_) | Commands::History(_) => {
            let shutdown = ShutdownCoordinator::install();
            connect::execute_online(&cli, &shutdown.token()).await
        }
    }
}
