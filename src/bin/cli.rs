//! pagewatch CLI
//!
//! Local entry point for running the monitor and managing its records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pagewatch::{
    error::Result,
    models::{Config, DEFAULT_SOURCE_KIND},
    pipeline::Monitor,
};
use serde::Serialize;
use uuid::Uuid;

/// pagewatch - web page change monitor
#[derive(Parser, Debug)]
#[command(
    name = "pagewatch",
    version,
    about = "Re-fetches registered pages and notifies webhooks on content changes"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scheduled sweeps until Ctrl-C
    Run,

    /// Run a single sweep now
    Sweep,

    /// Fetch a page through the cache and print it
    Parse { url: String },

    /// Manage monitored sources
    #[command(subcommand)]
    Source(SourceCommand),

    /// Manage webhook subscribers
    #[command(subcommand)]
    Subscribe(SubscribeCommand),

    /// List change events
    Changes {
        /// Only events strictly after this RFC 3339 timestamp (oldest first)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Attach the cached current article to each event
        #[arg(long)]
        include_article: bool,
    },

    /// Validate the configuration
    Validate,
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Register a page for monitoring
    Add {
        url: String,
        #[arg(long, default_value = DEFAULT_SOURCE_KIND)]
        kind: String,
    },
    List,
    Remove { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum SubscribeCommand {
    /// Register a webhook endpoint
    Add {
        callback_url: String,
        /// Only deliver events whose URL starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
    List,
    Remove { id: Uuid },
}

/// Load the config file if present, otherwise defaults.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    if !cli.config.exists() {
        log::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        return Err(e);
    }
    let monitor = Monitor::from_config(&config)?;

    match cli.command {
        Command::Run => {
            log::info!(
                "pagewatch starting (ttl {}s, interval {}s)",
                config.monitor.ttl_secs,
                config.monitor.interval_secs
            );
            monitor
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Cannot listen for Ctrl-C: {}", e);
                    }
                })
                .await;
        }

        Command::Sweep => {
            let report = monitor.sweep().await;
            monitor.shutdown().await;
            println!(
                "{} sources: {} changed, {} first checks, {} unchanged, {} not due, {} failed",
                report.total,
                report.changed,
                report.first_checks,
                report.unchanged,
                report.not_due,
                report.failed
            );
        }

        Command::Parse { url } => {
            let result = monitor.parse(&url).await;
            monitor.shutdown().await;
            print_json(&result?)?;
        }

        Command::Source(SourceCommand::Add { url, kind }) => {
            print_json(&monitor.register_source(&url, &kind).await?)?;
        }
        Command::Source(SourceCommand::List) => {
            print_json(&monitor.list_sources().await?)?;
        }
        Command::Source(SourceCommand::Remove { id }) => {
            monitor.unregister_source(id).await?;
        }

        Command::Subscribe(SubscribeCommand::Add {
            callback_url,
            prefix,
        }) => {
            print_json(&monitor.subscribe(&callback_url, prefix).await?)?;
        }
        Command::Subscribe(SubscribeCommand::List) => {
            print_json(&monitor.list_subscribers().await?)?;
        }
        Command::Subscribe(SubscribeCommand::Remove { id }) => {
            monitor.unsubscribe(id).await?;
        }

        Command::Changes {
            since,
            limit,
            include_article,
        } => {
            let events = monitor.list_changes(limit, since, include_article).await?;
            print_json(&events)?;
        }

        Command::Validate => {
            log::info!("Configuration OK");
            print_json(&config)?;
        }
    }

    Ok(())
}
