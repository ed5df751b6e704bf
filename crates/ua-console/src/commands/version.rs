// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::ConsoleResult;

/// Prints version and build information.
pub fn version(_cli: &Cli) -> ConsoleResult<()> {
    println!("ua-console - OPC UA session and history console");
    println!();
    println!("Version Information:");
    println!("  ua-console: {}", crate::VERSION);
    println!("  ua-client:  {}", ua_client::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:     {}", std::env::consts::ARCH);
    println!("  OS:         {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  OPC UA runtime: {}",
        if cfg!(feature = "opcua-runtime") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
