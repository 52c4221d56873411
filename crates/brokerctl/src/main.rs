use anyhow::Result;
use brokerctl_core::Config;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells};
use tracing::{debug, error, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands, OutputFormat};
use commands::CommandContext;
use connection::ConnectionManager;
use error::BrokerCtlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    // Load configuration from specified path or default location
    let loaded = if let Some(config_file) = &cli.config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        Config::load_from_path(&path).map(|config| (config, Some(path)))
    } else {
        debug!("Loading config from default location");
        Config::load().map(|config| (config, None))
    };
    let (config, config_path) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            BrokerCtlError::from(e).print_diagnostic();
            std::process::exit(1);
        }
    };
    let mut conn_mgr = ConnectionManager::with_config_path(config, config_path);

    if let Err(e) = execute_command(&cli, &mut conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "brokerctl=warn,brokerctl_core=warn",
            1 => "brokerctl=info,brokerctl_core=info",
            2 => "brokerctl=debug,brokerctl_core=debug",
            _ => "brokerctl=trace,brokerctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(
    cli: &Cli,
    conn_mgr: &mut ConnectionManager,
) -> Result<(), BrokerCtlError> {
    trace!("Executing command: {:?}", cli.command);
    info!("Command: {}", format_command(&cli.command));

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Version => {
            debug!("Showing version information");
            match cli.output {
                OutputFormat::Json | OutputFormat::Yaml => {
                    let output_data = serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "name": env!("CARGO_PKG_NAME"),
                    });
                    output::print_output(&output_data, cli.output, cli.query.as_deref())
                }
                _ => {
                    println!("brokerctl {}", env!("CARGO_PKG_VERSION"));
                    Ok(())
                }
            }
        }
        Commands::Completions { shell } => {
            debug!("Generating completions for {:?}", shell);
            generate_completions(*shell);
            Ok(())
        }
        Commands::Profile(profile_cmd) => {
            debug!("Executing profile command");
            commands::profile::handle_profile_command(
                profile_cmd,
                conn_mgr,
                cli.output,
                cli.query.as_deref(),
            )
        }
        Commands::Topic(topic_cmd) => {
            let ctx = command_context(cli, conn_mgr);
            commands::topic::handle_topic_command(topic_cmd, &ctx).await
        }
        Commands::Group(group_cmd) => {
            let ctx = command_context(cli, conn_mgr);
            commands::group::handle_group_command(group_cmd, &ctx).await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!("Command completed successfully in {:?}", duration),
        Err(e) => error!("Command failed after {:?}: {}", duration, e),
    }

    result
}

fn command_context<'a>(cli: &'a Cli, conn_mgr: &'a ConnectionManager) -> CommandContext<'a> {
    CommandContext {
        conn_mgr,
        profile: cli.profile.as_deref(),
        output: cli.output,
        query: cli.query.as_deref(),
    }
}

/// Generate shell completions
fn generate_completions(shell: cli::Shell) {
    let mut cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();

    match shell {
        cli::Shell::Bash => generate(shells::Bash, &mut cmd, name, &mut std::io::stdout()),
        cli::Shell::Zsh => generate(shells::Zsh, &mut cmd, name, &mut std::io::stdout()),
        cli::Shell::Fish => generate(shells::Fish, &mut cmd, name, &mut std::io::stdout()),
        cli::Shell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, name, &mut std::io::stdout())
        }
        cli::Shell::Elvish => generate(shells::Elvish, &mut cmd, name, &mut std::io::stdout()),
    }
}

/// Format command for human-readable logging (without sensitive data)
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Version => "version".to_string(),
        Commands::Completions { shell } => format!("completions {:?}", shell),
        Commands::Profile(cmd) => {
            use cli::ProfileCommands::*;
            match cmd {
                List => "profile list".to_string(),
                Path => "profile path".to_string(),
                Show { name } => format!("profile show {}", name),
                Set(args) => format!("profile set {} [credentials redacted]", args.name),
                Remove { name } => format!("profile remove {}", name),
                Default { name } => format!("profile default {}", name),
                Validate => "profile validate".to_string(),
            }
        }
        Commands::Topic(cmd) => {
            use cli::TopicCommands::*;
            match cmd {
                Create { name, .. } => format!("topic create {}", name),
                Delete { name, .. } => format!("topic delete {}", name),
                AddPartitions { name, total, .. } => {
                    format!("topic add-partitions {} --total {}", name, total)
                }
            }
        }
        Commands::Group(cmd) => {
            use cli::GroupCommands::*;
            match cmd {
                List { states, .. } => format!("group list ({} state filter(s))", states.len()),
                Describe { groups, .. } => format!("group describe {}", groups.join(" ")),
                Delete { groups, .. } => format!("group delete {}", groups.join(" ")),
            }
        }
    }
}
