//! QA CLI
//!
//! Command-line interface for exploring the Q&A store. The store is in
//! memory only, so every invocation works on the built-in demonstration data.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use qa_core::Config;

mod commands;
mod output;
mod seed;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "qa")]
#[command(about = "QA - In-memory questions and answers store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List questions, newest first
    #[command(alias = "ls")]
    Questions {
        /// Only questions with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Search questions by tag and text
    Search {
        /// Search term
        term: String,
    },
    /// Show a question with its answers and comments
    Show {
        /// Question ID
        id: u64,
    },
    /// Show questions sharing tags with a question
    Similar {
        /// Question ID
        id: u64,
    },
    /// List tags with usage counts
    Tags {
        /// Only tags starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Run the abuse checks against every user
    Users,
    /// Show store statistics
    Stats,
    /// Show a user's notifications
    Notifications {
        /// User name
        user: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (log_level or a rules field)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    init_logging(&config);

    let store = seed::demo_store(config)?;

    match cli.command {
        Commands::Questions { tag } => commands::question::list(&store, tag, &output),
        Commands::Search { term } => commands::question::search(&store, &term, &output),
        Commands::Show { id } => commands::question::show(&store, id, &output),
        Commands::Similar { id } => commands::question::similar(&store, id, &output),
        Commands::Tags { prefix } => commands::tag::list(&store, prefix, &output),
        Commands::Users => commands::user::check(&store, &output),
        Commands::Stats => commands::stats::show(&store, &output),
        Commands::Notifications { user } => commands::notification::list(&store, &user, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Log to stderr so JSON output on stdout stays clean
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &Config) {
    let level = &config.log_level;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("qa_core={},qa_cli={}", level, level)));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
