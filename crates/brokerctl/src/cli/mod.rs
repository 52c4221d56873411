//! CLI structure and command definitions
//!
//! Admin commands (`topic`, `group`) live in [`admin`]; profile management
//! and housekeeping commands are defined here.

use clap::{Parser, Subcommand};

pub mod admin;

pub use admin::*;

/// Admin CLI for message-broker clusters
#[derive(Parser, Debug)]
#[command(name = "brokerctl")]
#[command(version, about = "Admin CLI for message-broker clusters")]
#[command(long_about = "
Admin CLI for message-broker clusters

Create and delete topics, grow partition counts, and list, describe and
delete consumer groups using the cluster described by a profile.

EXAMPLES:
    # Set up a profile backed by the in-process sandbox cluster
    brokerctl profile set local --bootstrap-servers localhost:9092 \\
        --sandbox-state ~/.local/share/brokerctl/local.json

    # Create a topic with three partitions
    brokerctl topic create orders --partitions 3

    # List stable consumer groups as a table
    brokerctl group list --state stable -o table

    # Filter output with JMESPath
    brokerctl group describe billing -q '[].members[].member_id'

For more help on a specific command, run:
    brokerctl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "BROKERCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "BROKERCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// JMESPath query to filter output
    #[arg(long, short = 'q', global = true)]
    pub query: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table for humans, JSON when filtering with --query
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Topic administration
    #[command(subcommand, visible_alias = "t")]
    #[command(after_help = "EXAMPLES:
    brokerctl topic create orders --partitions 3 --replication-factor 2
    brokerctl topic create audit --config retention.ms=86400000
    brokerctl topic add-partitions orders --total 6
    brokerctl topic delete scratch
")]
    Topic(TopicCommands),

    /// Consumer group administration
    #[command(subcommand, visible_alias = "g")]
    #[command(after_help = "EXAMPLES:
    brokerctl group list
    brokerctl group list --state stable --state empty
    brokerctl group describe billing shipping --include-authorized-operations
    brokerctl group delete stale-group
")]
    Group(GroupCommands),

    /// Profile management
    #[command(subcommand, visible_alias = "prof", visible_alias = "pr")]
    #[command(after_help = "EXAMPLES:
    # Create a SASL profile (password will be prompted)
    brokerctl profile set prod --bootstrap-servers kafka-1:9093,kafka-2:9093 \\
        --security-protocol sasl_ssl --sasl-mechanism SCRAM-SHA-512 --sasl-username admin

    # Create a sandbox profile
    brokerctl profile set local --bootstrap-servers localhost:9092 --sandbox-state ./cluster.json

    # List, inspect and pick the default
    brokerctl profile list
    brokerctl profile show prod
    brokerctl profile default prod

    # Validate configuration
    brokerctl profile validate
")]
    Profile(ProfileCommands),

    /// Version information
    #[command(visible_alias = "ver", visible_alias = "v")]
    Version,

    /// Generate shell completions
    #[command(visible_alias = "comp")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion generation
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell", alias = "power-shell")]
    PowerShell,
    Elvish,
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all configured profiles
    #[command(visible_alias = "ls", visible_alias = "l")]
    List,

    /// Show the path to the configuration file
    Path,

    /// Show details of a specific profile
    #[command(visible_alias = "sh", visible_alias = "get")]
    Show {
        /// Profile name to show
        name: String,
    },

    /// Set or create a profile
    #[command(visible_alias = "add", visible_alias = "create")]
    Set(Box<ProfileSetArgs>),

    /// Remove a profile
    #[command(visible_alias = "rm", visible_alias = "del", visible_alias = "delete")]
    Remove {
        /// Profile name to remove
        name: String,
    },

    /// Set the default profile
    #[command(visible_alias = "def")]
    Default {
        /// Profile name to use when --profile is not given
        name: String,
    },

    /// Validate configuration file and profiles
    #[command(visible_alias = "check")]
    Validate,
}

#[derive(clap::Args, Debug)]
pub struct ProfileSetArgs {
    /// Profile name
    pub name: String,

    /// Comma-separated host:port list
    #[arg(long)]
    pub bootstrap_servers: String,

    /// Client id reported to the cluster
    #[arg(long)]
    pub client_id: Option<String>,

    /// plaintext, ssl, sasl_plaintext or sasl_ssl
    #[arg(long, value_parser = parse_security_protocol)]
    pub security_protocol: Option<brokerctl_core::config::SecurityProtocol>,

    /// SASL mechanism, e.g. PLAIN, SCRAM-SHA-512 or OAUTHBEARER
    #[arg(long)]
    pub sasl_mechanism: Option<String>,

    /// SASL username
    #[arg(long, requires = "sasl_mechanism")]
    pub sasl_username: Option<String>,

    /// SASL password (prompted when a username is given without one)
    #[arg(long, requires = "sasl_username")]
    pub sasl_password: Option<String>,

    /// Value for sasl.oauthbearer.config
    #[arg(long)]
    pub oauthbearer_config: Option<String>,

    /// Default timeout for admin operations, in milliseconds
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Operations allowed in flight at once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Extra client property (repeatable)
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,

    /// Use the in-process sandbox cluster, persisted to this JSON file
    #[arg(long, value_name = "PATH")]
    pub sandbox_state: Option<String>,

    /// Simulated result latency for the sandbox cluster, in milliseconds
    #[arg(long, requires = "sandbox_state")]
    pub sandbox_latency_ms: Option<u64>,

    /// Store the SASL password in the OS keyring instead of the config file
    #[cfg(feature = "secure-storage")]
    #[arg(long, requires = "sasl_username")]
    pub use_keyring: bool,
}

fn parse_security_protocol(s: &str) -> Result<brokerctl_core::config::SecurityProtocol, String> {
    s.parse()
}

/// Parse `key=value`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
