//! Topic and consumer-group command definitions

use brokerctl_core::GroupState;
use clap::Subcommand;

/// Timeout flag shared by every admin command
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct TimeoutArgs {
    /// Give up after this many milliseconds (default: profile request timeout, else 5000)
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum TopicCommands {
    /// Create a topic
    #[command(visible_alias = "add")]
    Create {
        /// Topic name
        name: String,
        /// Partition count (-1 for the broker default)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        partitions: i32,
        /// Replication factor (-1 for the broker default)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        replication_factor: i32,
        /// Topic config entry (repeatable)
        #[arg(long = "config", value_name = "KEY=VALUE", value_parser = super::parse_key_value)]
        configs: Vec<(String, String)>,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },

    /// Delete a topic
    #[command(visible_alias = "rm")]
    Delete {
        /// Topic name
        name: String,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },

    /// Grow a topic to a new total partition count
    #[command(name = "add-partitions")]
    AddPartitions {
        /// Topic name
        name: String,
        /// New total partition count
        #[arg(long)]
        total: i32,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// List consumer groups
    #[command(visible_alias = "ls")]
    List {
        /// Only groups in this state (repeatable)
        #[arg(long = "state", value_name = "STATE", value_parser = parse_group_state)]
        states: Vec<GroupState>,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },

    /// Describe consumer groups
    #[command(visible_alias = "show")]
    Describe {
        /// Group ids
        #[arg(required = true)]
        groups: Vec<String>,
        /// Include the operations the caller may perform on each group
        #[arg(long)]
        include_authorized_operations: bool,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },

    /// Delete consumer groups
    #[command(visible_alias = "rm")]
    Delete {
        /// Group ids
        #[arg(required = true)]
        groups: Vec<String>,
        #[command(flatten)]
        timeout: TimeoutArgs,
    },
}

/// Parse a group state case-insensitively; `-` and `_` are interchangeable
fn parse_group_state(s: &str) -> Result<GroupState, String> {
    s.parse::<GroupState>().map_err(|_| {
        let valid: Vec<String> = GroupState::ALL
            .iter()
            .map(|state| state.as_str().to_lowercase())
            .collect();
        format!("invalid group state: {} (valid: {})", s, valid.join(", "))
    })
}
