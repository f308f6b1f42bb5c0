//! oyez-fetch entry point.
//!
//! Thin front end over the adaptive fetcher and the cache sweep.
//! Logging goes to stderr so stdout only carries summaries.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oyez_core::AppConfig;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "oyez-fetch", version, about = "Adaptive-parallelism fetcher with a versioned response cache")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Cache root (overrides OYEZ_CACHE_DIR).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch URLs through the cache, scaling concurrency to the server.
    Fetch(commands::FetchArgs),
    /// Delete cache records whose expiry has passed.
    ClearExpired,
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = AppConfig::load()?;
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }

    match cli.command {
        Command::Fetch(args) => commands::fetch(config, args).await,
        Command::ClearExpired => commands::clear_expired(&config).await,
    }
}
