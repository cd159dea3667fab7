//! parfetch CLI - parallel ranged HTTP downloader
//!
//! Fetches one URL as concurrent byte ranges and reassembles it locally.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// parfetch - split a download into parallel ranged requests
#[derive(Parser)]
#[command(name = "parfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, env = "PARFETCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a URL
    Get {
        /// URL to download
        url: String,

        /// Output file path (defaults to the last segment of the URL)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel ranged requests
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Probe URLs for size and range support
    Probe {
        /// URLs to probe
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        use clap::CommandFactory;
        clap_complete::generate(shell, &mut Cli::command(), "parfetch", &mut std::io::stdout());
        return Ok(());
    }

    let mut settings = parfetch_core::load_settings(cli.config.as_deref()).await?;
    tracing::debug!(?settings, "Loaded settings");

    match cli.command {
        Commands::Get {
            url,
            output,
            concurrency,
            timeout,
        } => {
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                settings.request_timeout_secs = Some(timeout);
            }
            commands::get(settings, &url, output, cli.format).await?
        }

        Commands::Probe { urls } => commands::probe_urls(settings, urls, cli.format).await?,

        Commands::Completions { .. } => {}
    }

    Ok(())
}
