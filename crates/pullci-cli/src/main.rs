//! pullci command-line tool.

use clap::{Parser, Subcommand};
use pullci_config::CONFIG_ENV;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod git;
mod github;
mod notifier;
mod registry;

#[derive(Parser)]
#[command(name = "pullci")]
#[command(about = "Tests open pull requests of monitored repositories", long_about = None)]
struct Cli {
    /// Server configuration file [default: ~/.pullci/pullci.kdl]
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every repository that is due and test its open pull requests
    Cron,
    /// Start monitoring the repository described by a settings file
    Install {
        /// Repository settings file
        path: PathBuf,
    },
    /// Stop monitoring a repository and forget its processed pull requests
    Uninstall {
        /// Repository settings file, as installed
        path: PathBuf,
    },
    /// List installed repositories and their last check
    List,
    /// Allow cron cycles to run
    Enable,
    /// Make cron cycles exit without doing anything
    Disable,
    /// Check the server configuration and optional repository settings
    Validate {
        /// Repository settings files to check as well
        repos: Vec<PathBuf>,
    },
}

fn init_tracing(json: bool, verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Cron => commands::cron::run(config).await?,
        Commands::Install { path } => commands::install::install(config, &path)?,
        Commands::Uninstall { path } => commands::install::uninstall(config, &path)?,
        Commands::List => commands::list::run(config)?,
        Commands::Enable => commands::toggle::set_enabled(config, true)?,
        Commands::Disable => commands::toggle::set_enabled(config, false)?,
        Commands::Validate { repos } => commands::validate::run(config, &repos)?,
    }

    Ok(())
}
