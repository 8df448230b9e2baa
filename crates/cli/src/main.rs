//! MAPE-K adaptation controller CLI
//!
//! Inspects a managed system, runs one-shot adaptation cycles and queries
//! a running controller daemon.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{adapt, daemon, inspect, settings, Session};
use controller_lib::{PolicyKind, SchemaKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MAPE-K adaptation controller CLI
#[derive(Parser)]
#[command(name = "mapek")]
#[command(author, version, about = "CLI for the MAPE-K adaptation controller", long_about = None)]
pub struct Cli {
    /// Managed system URL (can also be set via MAPEK_BASE_URL env var)
    #[arg(long, env = "MAPEK_BASE_URL")]
    pub base_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Wait for the managed system's warm-up before the first monitor fetch
    #[arg(long)]
    pub cold_start: bool,

    /// Monitor attempts before giving up
    #[arg(long, default_value_t = 10)]
    pub attempts: u32,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a JSON schema published by the managed system
    Schema {
        #[arg(value_enum)]
        kind: SchemaArg,
    },

    /// Show the current monitored architecture
    Monitor {
        /// Skip validation against the monitor schema
        #[arg(long)]
        no_validate: bool,
    },

    /// Show the adaptation options the managed system offers
    Options {
        /// Skip validation against the options schema
        #[arg(long)]
        no_validate: bool,
    },

    /// Run a single monitor, analyze, plan and execute cycle
    Cycle {
        /// Analysis and planning strategy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Stop after planning and print the plan
        #[arg(long)]
        dry_run: bool,

        /// Service controlled by the server-dimmer policy
        #[arg(long)]
        target_service: Option<String>,

        /// Availability floor in percent
        #[arg(long)]
        availability_floor: Option<f64>,

        /// Response-time ceiling in seconds
        #[arg(long)]
        response_time_ceiling: Option<f64>,
    },

    /// Submit a plan read from a JSON file
    Execute {
        /// Plan file (`{"requests": [...]}` or a target state)
        #[arg(long, short)]
        file: PathBuf,

        /// Validate each payload against the execute schema first
        #[arg(long)]
        validate: bool,
    },

    /// Show the health of a running controller daemon
    Status {
        /// Daemon API URL (can also be set via MAPEK_DAEMON_URL env var)
        #[arg(long, env = "MAPEK_DAEMON_URL")]
        daemon_url: Option<String>,
    },

    /// Show the knowledge held by a running controller daemon
    Knowledge {
        /// Daemon API URL (can also be set via MAPEK_DAEMON_URL env var)
        #[arg(long, env = "MAPEK_DAEMON_URL")]
        daemon_url: Option<String>,
    },

    /// Manage stored CLI defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the stored defaults
    Show,

    /// Store the default managed system URL
    SetBaseUrl { url: String },

    /// Store the default daemon API URL
    SetDaemonUrl { url: String },

    /// Store the default policy for `cycle`
    SetPolicy {
        #[arg(value_enum)]
        policy: PolicyArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SchemaArg {
    Monitor,
    Execute,
    AdaptationOptions,
}

impl From<SchemaArg> for SchemaKind {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Monitor => SchemaKind::Monitor,
            SchemaArg::Execute => SchemaKind::Execute,
            SchemaArg::AdaptationOptions => SchemaKind::AdaptationOptions,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    InstanceScaling,
    QosReport,
    ServerDimmer,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::InstanceScaling => PolicyKind::InstanceScaling,
            PolicyArg::QosReport => PolicyKind::QosReport,
            PolicyArg::ServerDimmer => PolicyKind::ServerDimmer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let stored = config::Config::load()?;
    let session = Session {
        base_url: stored.resolve_base_url(cli.base_url.as_deref()),
        format: cli.format,
        cold_start: cli.cold_start,
        attempts: cli.attempts,
    };

    match cli.command {
        Commands::Schema { kind } => {
            inspect::show_schema(&session, kind.into()).await?;
        }
        Commands::Monitor { no_validate } => {
            inspect::show_monitor(&session, !no_validate).await?;
        }
        Commands::Options { no_validate } => {
            inspect::show_options(&session, !no_validate).await?;
        }
        Commands::Cycle {
            policy,
            dry_run,
            target_service,
            availability_floor,
            response_time_ceiling,
        } => {
            let stored_policy = stored
                .default_policy
                .as_deref()
                .map(str::parse::<PolicyKind>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let args = adapt::CycleArgs {
                policy: policy.map(PolicyKind::from).or(stored_policy).unwrap_or_default(),
                dry_run,
                target_service,
                availability_floor,
                response_time_ceiling,
            };
            adapt::run_cycle(&session, args).await?;
        }
        Commands::Execute { file, validate } => {
            adapt::execute_plan(&session, &file, validate).await?;
        }
        Commands::Status { daemon_url } => {
            let url = stored.resolve_daemon_url(daemon_url.as_deref());
            daemon::show_status(&url, cli.format).await?;
        }
        Commands::Knowledge { daemon_url } => {
            let url = stored.resolve_daemon_url(daemon_url.as_deref());
            daemon::show_knowledge(&url, cli.format).await?;
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => settings::show(stored, cli.format)?,
            ConfigCommands::SetBaseUrl { url } => settings::set_base_url(stored, &url)?,
            ConfigCommands::SetDaemonUrl { url } => settings::set_daemon_url(stored, &url)?,
            ConfigCommands::SetPolicy { policy } => {
                settings::set_policy(stored, PolicyKind::from(policy))?
            }
        },
    }

    Ok(())
}
