//! klinik - command line frontend for the clinic site's offline cache and
//! counseling schedule.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use klinik_core::Config;

/// Log file name inside the cache directory
const LOG_FILE: &str = "klinik.log";

#[derive(Parser)]
#[command(name = "klinik", version, about = "Offline cache and counseling schedule tools for the clinic site")]
struct Cli {
    /// Also write logs to klinik.log in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Override the cache directory
    #[arg(long, global = true, env = "KLINIK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Precache the shell for the configured version and evict old caches
    Install,

    /// Route one request through the fetch policies
    Fetch {
        /// Path on the site origin, or an absolute URL
        target: String,

        /// Send as a page navigation
        #[arg(long)]
        html: bool,

        /// Print the response body to stdout
        #[arg(long)]
        body: bool,
    },

    /// List caches and their entries
    Caches {
        /// Show every cached request
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the counseling calendar
    Calendar {
        /// Month to show, as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,

        /// Show the sessions for one date, as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_env();
    let cache_dir = match cli.cache_dir {
        Some(dir) => dir,
        None => config.cache_dir()?,
    };

    let log_dir = if cli.log_file {
        std::fs::create_dir_all(&cache_dir)?;
        Some(cache_dir.clone())
    } else {
        None
    };
    let _guard = init_tracing(log_dir);
    info!(cache_dir = %cache_dir.display(), "klinik starting");

    match cli.command {
        Command::Install => commands::install(&config, &cache_dir).await,
        Command::Fetch { target, html, body } => {
            commands::fetch(&config, &cache_dir, &target, html, body).await
        }
        Command::Caches { verbose } => commands::caches(&cache_dir, verbose),
        Command::Calendar { month, date } => {
            commands::calendar(&config, month.as_deref(), date.as_deref()).await
        }
    }
}
