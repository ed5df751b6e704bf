// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line console for `ua-client`.
//!
//! Opens a session on an OPC UA server, directly or through reverse
//! connect, and runs one read, browse or history read against it.
//!
//! # Commands
//!
//! - `read`: read node values
//! - `browse`: list the hierarchical references of a node
//! - `history raw|processed|events`: paged history reads
//! - `listen`: accept reverse connections and print what servers announce
//! - `validate`: check a client configuration file
//! - `version`: show version information
//!
//! Commands that open sessions need a build with the `opcua-runtime` feature.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use cli::{Cli, Commands, LogFormat, OutputFormat};
pub use error::{ConsoleError, ConsoleResult};
pub use shutdown::ShutdownCoordinator;

/// Console version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Console name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
