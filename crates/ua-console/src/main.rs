// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! ua-console entry point.

use ua_console::cli::Cli;
use ua_console::error::report_error_and_exit;
use ua_console::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(error) = ua_console::commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
