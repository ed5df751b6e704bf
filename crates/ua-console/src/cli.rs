// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use ua_client::certificate::TrustPolicy;
use ua_client::services::Aggregate;
use ua_client::types::{NodeId, UserIdentity};
use ua_client::SessionRequest;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// ua-console - OPC UA session and history console
///
/// Opens sessions on OPC UA servers, directly or through reverse connect,
/// and reads values, references and history with continuation point paging.
#[derive(Parser, Debug)]
#[command(
    name = "ua-console",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA session and history console",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Client configuration file path
    #[arg(
        short,
        long,
        default_value = "ua-client.toml",
        env = "UA_CONSOLE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "UA_CONSOLE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "UA_CONSOLE_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parses arguments from the process command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the log level after applying `--quiet` and `--verbose`.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read the values of one or more nodes
    Read(ReadArgs),

    /// Browse the hierarchical references of a node
    ///
    /// Follows continuation points until every reference was returned or
    /// `--max-results` is reached.
    Browse(BrowseArgs),

    /// Read history of one or more nodes
    #[command(subcommand)]
    History(HistoryCommand),

    /// Accept reverse connections and print the announced servers
    Listen(ListenArgs),

    /// Validate the client configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

impl Commands {
    /// Returns the command name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Browse(_) => "browse",
            Self::History(HistoryCommand::Raw(_)) => "history raw",
            Self::History(HistoryCommand::Processed(_)) => "history processed",
            Self::History(HistoryCommand::Events(_)) => "history events",
            Self::Listen(_) => "listen",
            Self::Validate(_) => "validate",
            Self::Version => "version",
        }
    }
}

/// History read kinds.
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// Raw values in a time range
    Raw(RawArgs),
    /// Aggregated values in a time range
    Processed(ProcessedArgs),
    /// Historical events in a time range
    Events(EventsArgs),
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// How to reach the server and authenticate.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Server URL; with `--reverse` the client URL the server dials
    pub url: String,

    /// Require a signed and encrypted endpoint
    #[arg(short, long)]
    pub secure: bool,

    /// Wait for the server to dial in instead of dialing it
    #[arg(short, long)]
    pub reverse: bool,

    /// Only accept reverse connections from this server URI
    #[arg(long, requires = "reverse")]
    pub server_uri: Option<String>,

    /// Username for an identified session (requires --secure)
    #[arg(short, long, requires = "password")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(long, env = "UA_CONSOLE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Session name override
    #[arg(long)]
    pub session_name: Option<String>,

    /// Accept the untrusted server certificate with this SHA-256 thumbprint
    #[arg(long = "trust", value_name = "THUMBPRINT")]
    pub trusted_thumbprints: Vec<String>,
}

impl ConnectArgs {
    /// Returns the user identity.
    pub fn identity(&self) -> UserIdentity {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => UserIdentity::user_name(user, password),
            _ => UserIdentity::Anonymous,
        }
    }

    /// Builds the session request.
    pub fn session_request(&self) -> SessionRequest {
        let mut request = SessionRequest::new(&self.url)
            .with_identity(self.identity())
            .with_security(self.secure)
            .with_reverse_connect(self.reverse)
            .with_trust_policy(self.trust_policy());
        if let Some(name) = &self.session_name {
            request = request.with_session_name(name);
        }
        if let Some(uri) = &self.server_uri {
            request = request.with_server_uri(uri);
        }
        request
    }

    /// Returns the trust policy for untrusted server certificates.
    pub fn trust_policy(&self) -> TrustPolicy {
        if self.trusted_thumbprints.is_empty() {
            TrustPolicy::Strict
        } else {
            TrustPolicy::thumbprints(self.trusted_thumbprints.clone())
        }
    }
}

/// Time range of a history read.
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Range start: RFC 3339 timestamp or a duration ago such as `2h`
    #[arg(long, value_parser = parse_time)]
    pub start: DateTime<Utc>,

    /// Range end: RFC 3339 timestamp or a duration ago (default: now)
    #[arg(long, value_parser = parse_time)]
    pub end: Option<DateTime<Utc>>,
}

impl RangeArgs {
    /// Returns the range end, defaulting to now.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end.unwrap_or_else(Utc::now)
    }
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Connection settings
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Nodes to read, e.g. `ns=2;s=Pump1.Speed` (default: the namespace array)
    #[arg(value_parser = parse_node_id)]
    pub nodes: Vec<NodeId>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl ReadArgs {
    /// Returns the nodes to read.
    pub fn targets(&self) -> Vec<NodeId> {
        if self.nodes.is_empty() {
            vec![NodeId::NAMESPACE_ARRAY]
        } else {
            self.nodes.clone()
        }
    }
}

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    /// Connection settings
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Nodes to browse (default: the Objects folder)
    #[arg(value_parser = parse_node_id)]
    pub nodes: Vec<NodeId>,

    /// Stop after this many references per node
    #[arg(long)]
    pub max_results: Option<usize>,

    /// References requested per round
    #[arg(long)]
    pub per_round: Option<u32>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl BrowseArgs {
    /// Returns the nodes to browse.
    pub fn roots(&self) -> Vec<NodeId> {
        if self.nodes.is_empty() {
            vec![NodeId::OBJECTS_FOLDER]
        } else {
            self.nodes.clone()
        }
    }
}

/// Arguments for `history raw`.
#[derive(Args, Debug, Clone)]
pub struct RawArgs {
    /// Connection settings
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Time range
    #[command(flatten)]
    pub range: RangeArgs,

    /// Nodes to read
    #[arg(required = true, value_parser = parse_node_id)]
    pub nodes: Vec<NodeId>,

    /// Values per node and round (0: server default)
    #[arg(long, default_value = "0")]
    pub max_values: u32,

    /// Include bounding values
    #[arg(long)]
    pub bounds: bool,

    /// Stop after the first round and release continuation points
    #[arg(long)]
    pub first_round_only: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `history processed`.
#[derive(Args, Debug, Clone)]
pub struct ProcessedArgs {
    /// Connection settings
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Time range
    #[command(flatten)]
    pub range: RangeArgs,

    /// Nodes to read
    #[arg(required = true, value_parser = parse_node_id)]
    pub nodes: Vec<NodeId>,

    /// Aggregate function
    #[arg(long, default_value = "average")]
    pub aggregate: AggregateArg,

    /// Processing interval, e.g. `1m` or `15s`
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `history events`.
#[derive(Args, Debug, Clone)]
pub struct EventsArgs {
    /// Connection settings
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Time range
    #[command(flatten)]
    pub range: RangeArgs,

    /// Event notifier nodes, e.g. `i=2253`
    #[arg(required = true, value_parser = parse_node_id)]
    pub nodes: Vec<NodeId>,

    /// Events per node and round (0: server default)
    #[arg(long, default_value = "0")]
    pub max_values: u32,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `listen` command.
#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Client URL to listen on (default: the configured client endpoint URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Stop after this many connections
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Stop after this long without a connection
    #[arg(long, value_parser = humantime::parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show the parsed configuration
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Standard aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AggregateArg {
    /// Interpolated value at each interval start
    Interpolative,
    /// Arithmetic mean
    Average,
    /// Time-weighted mean
    TimeAverage,
    /// Time-weighted sum
    Total,
    /// Smallest value
    Minimum,
    /// Largest value
    Maximum,
    /// Maximum minus minimum
    Range,
    /// Number of values
    Count,
    /// First value
    Start,
    /// Last value
    End,
}

impl From<AggregateArg> for Aggregate {
    fn from(arg: AggregateArg) -> Self {
        match arg {
            AggregateArg::Interpolative => Aggregate::Interpolative,
            AggregateArg::Average => Aggregate::Average,
            AggregateArg::TimeAverage => Aggregate::TimeAverage,
            AggregateArg::Total => Aggregate::Total,
            AggregateArg::Minimum => Aggregate::Minimum,
            AggregateArg::Maximum => Aggregate::Maximum,
            AggregateArg::Range => Aggregate::Range,
            AggregateArg::Count => Aggregate::Count,
            AggregateArg::Start => Aggregate::Start,
            AggregateArg::End => Aggregate::End,
        }
    }
}

// =============================================================================
// Value Parsers
// =============================================================================

fn parse_node_id(value: &str) -> Result<NodeId, String> {
    value.parse().map_err(|e: ua_client::UaError| e.to_string())
}

/// Parses an RFC 3339 timestamp, or a duration counted back from now.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let ago = humantime::parse_duration(value)
        .map_err(|_| format!("'{}' is neither an RFC 3339 timestamp nor a duration", value))?;
    let ago = chrono::Duration::from_std(ago).map_err(|e| e.to_string())?;
    Ok(Utc::now() - ago)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_read_command() {
        let cli = Cli::parse_from(["ua-console", "read", "opc.tcp://plc:4840", "ns=2;s=Speed", "i=2255"]);
        let Commands::Read(args) = cli.command else {
            panic!("Expected Read command");
        };
        assert_eq!(args.connect.url, "opc.tcp://plc:4840");
        assert_eq!(args.nodes, vec![NodeId::string(2, "Speed"), NodeId::NAMESPACE_ARRAY]);
        assert_eq!(args.connect.identity(), UserIdentity::Anonymous);
    }

    #[test]
    fn test_read_defaults_to_namespace_array() {
        let cli = Cli::parse_from(["ua-console", "read", "opc.tcp://plc:4840"]);
        let Commands::Read(args) = cli.command else {
            panic!("Expected Read command");
        };
        assert_eq!(args.targets(), vec![NodeId::NAMESPACE_ARRAY]);
    }

    #[test]
    fn test_invalid_node_is_rejected() {
        let result = Cli::try_parse_from(["ua-console", "read", "opc.tcp://plc:4840", "ns=x;i=1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_browse_defaults_to_objects_folder() {
        let cli = Cli::parse_from(["ua-console", "browse", "opc.tcp://plc:4840", "--max-results", "50"]);
        let Commands::Browse(args) = cli.command else {
            panic!("Expected Browse command");
        };
        assert_eq!(args.roots(), vec![NodeId::OBJECTS_FOLDER]);
        assert_eq!(args.max_results, Some(50));
    }

    #[test]
    fn test_reverse_identified_request() {
        let cli = Cli::parse_from([
            "ua-console",
            "read",
            "opc.tcp://0.0.0.0:4850",
            "--reverse",
            "--secure",
            "--server-uri",
            "urn:plc",
            "--user",
            "operator",
            "--password",
            "secret",
            "i=2255",
        ]);
        let Commands::Read(args) = cli.command else {
            panic!("Expected Read command");
        };
        let request = args.connect.session_request();
        assert!(request.reverse_connect);
        assert_eq!(request.server_uri.as_deref(), Some("urn:plc"));
        assert_eq!(request.identity, UserIdentity::user_name("operator", "secret"));
    }

    #[test]
    fn test_server_uri_requires_reverse() {
        let result = Cli::try_parse_from([
            "ua-console",
            "read",
            "opc.tcp://plc:4840",
            "--server-uri",
            "urn:plc",
            "i=2255",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_processed_command() {
        let cli = Cli::parse_from([
            "ua-console",
            "history",
            "processed",
            "opc.tcp://plc:4840",
            "--start",
            "2025-03-01T00:00:00Z",
            "--end",
            "2025-03-02T00:00:00Z",
            "--aggregate",
            "maximum",
            "--interval",
            "15m",
            "ns=2;s=Flow",
        ]);
        let Commands::History(HistoryCommand::Processed(args)) = cli.command else {
            panic!("Expected history processed command");
        };
        assert_eq!(args.range.start, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(args.interval, Duration::from_secs(900));
        assert_eq!(Aggregate::from(args.aggregate), Aggregate::Maximum);
    }

    #[test]
    fn test_parse_time_relative() {
        let before = Utc::now();
        let parsed = parse_time("2h").unwrap();
        assert!(parsed <= before - chrono::Duration::hours(2) + chrono::Duration::seconds(1));
        assert!(parse_time("yesterday-ish").is_err());
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["ua-console", "-q", "version"]);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["ua-console", "-v", "version"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["ua-console", "-c", "/etc/ua/client.toml", "validate", "--strict"]);
        assert_eq!(cli.config, PathBuf::from("/etc/ua/client.toml"));
        assert_eq!(cli.command.name(), "validate");
    }

    #[test]
    fn test_trust_thumbprints() {
        let cli = Cli::parse_from([
            "ua-console",
            "read",
            "opc.tcp://plc:4840",
            "--secure",
            "--trust",
            "AB12",
            "i=2255",
        ]);
        let Commands::Read(args) = cli.command else {
            panic!("Expected Read command");
        };
        assert!(matches!(args.connect.trust_policy(), TrustPolicy::Predicate(_)));
    }
}
