//! searchnode CLI: the entry point called by provisioning and by the templating
//! daemon's post-render commands.
//!
//! # Usage
//!
//! ```text
//! searchnode provision
//! searchnode --config /etc/searchnode/node.yml converge --snapshot /tmp/elasticsearch_prerequisites.yml
//! searchnode metrics --consul
//! searchnode status --json
//! searchnode reset-flag
//! ```

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use searchnode_core::convergence::ThreadSleeper;
use searchnode_core::data::settings;
use searchnode_core::infrastructure::runner::SystemRunner;
use searchnode_core::infrastructure::systemd::Systemctl;

use commands::Host;

const DEFAULT_CONFIG: &str = "/etc/searchnode/node.yml";

#[derive(Debug, Parser)]
#[command(name = "searchnode", version, about = "Search node bootstrap and convergence")]
struct Cli {
    /// Node configuration file.
    #[arg(long, global = true, env = "SEARCHNODE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the cluster configuration and start the service, once.
    Converge(SourceArgs),
    /// Render the collector input and restart the collector if it changed.
    Metrics(SourceArgs),
    /// Lay down directories, static files, templates, the flag and firewall rules.
    Provision,
    /// Print the cluster configuration that would be written.
    Render {
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show the flag, the service state and which prerequisites exist.
    Status(SourceArgs),
    /// Mark the node as not initialized so the next converge runs again.
    ResetFlag,
}

/// Where prerequisite keys are read from. Without either flag the snapshot
/// path from the node configuration is used.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Snapshot rendered by the templating daemon.
    #[arg(long, conflicts_with = "consul")]
    pub snapshot: Option<PathBuf>,

    /// Query the coordination store directly.
    #[arg(long)]
    pub consul: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match settings::load_or_default(cli.config.as_deref(), &PathBuf::from(DEFAULT_CONFIG)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("searchnode: {}", e);
            process::exit(1);
        }
    };

    let systemctl = Systemctl::new(SystemRunner);
    let host = Host {
        services: &systemctl,
        sleeper: &ThreadSleeper,
        runner: &SystemRunner,
    };

    let result = match cli.command {
        Command::Converge(source) => commands::converge(&config, host, &source, cli.json),
        Command::Metrics(source) => commands::metrics(&config, host, &source, cli.json),
        Command::Provision => commands::provision(&config, host, cli.json),
        Command::Render { snapshot } => commands::render(&config, snapshot.as_deref()),
        Command::Status(source) => commands::status(&config, host, &source, cli.json),
        Command::ResetFlag => commands::reset_flag(&config),
    };

    process::exit(commands::finish(result));
}
