mod args;
mod commands;
mod runner;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use xpulse_fetcher::DEFAULT_SUBJECT_CONCURRENCY;

use crate::args::FetchArgs;
use crate::commands::DbCommands;

#[derive(Debug, Parser)]
#[command(name = "xpulse")]
#[command(about = "Fetch and track post analytics for profiles, posts, and searches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Classify the URLs of a CSV upload without fetching anything
    Parse {
        file: PathBuf,
        /// Largest accepted batch (defaults to XPULSE_MAX_BATCH_URLS)
        #[arg(long)]
        max_urls: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch recent posts for a list of authors (handles or profile URLs)
    Authors {
        /// Newline- or comma-separated authors
        authors: String,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Run keyword searches, one per argument
    Search {
        #[arg(required = true)]
        keywords: Vec<String>,
        /// Searches in flight at once (1-3)
        #[arg(long, default_value_t = DEFAULT_SUBJECT_CONCURRENCY)]
        concurrency: usize,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Register a CSV upload as requests and fetch every one of them
    Import {
        file: PathBuf,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Show a stored request and its children
    Status {
        id: Uuid,
        /// Print the requests as JSON
        #[arg(long)]
        json: bool,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = xpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Parse {
            file,
            max_urls,
            json,
        } => commands::run_parse(&config, &file, max_urls, json).await,
        Commands::Authors { authors, fetch } => {
            commands::run_authors(&config, &authors, &fetch, cancel).await
        }
        Commands::Search {
            keywords,
            concurrency,
            fetch,
        } => commands::run_search(&config, &keywords, concurrency, &fetch, cancel).await,
        Commands::Import { file, fetch } => {
            commands::run_import(&config, &file, &fetch, cancel).await
        }
        Commands::Status { id, json } => commands::run_status(&config, id, json).await,
        Commands::Db { command } => match command {
            DbCommands::Migrate => commands::run_db_migrate(&config).await,
            DbCommands::Ping => commands::run_db_ping(&config).await,
        },
    }
}

/// Token cancelled on the first Ctrl-C. In-flight runs stop at their next
/// chunk boundary and are recorded as failed.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling run");
            trigger.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests;
