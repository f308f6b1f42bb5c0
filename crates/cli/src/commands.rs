//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use oyez_client::{AdaptiveFetcher, FetcherConfig, Progress};
use oyez_core::{AppConfig, FetchResult, FileCache, Request};

const PB_TEMPLATE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {msg}";

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URL to fetch. Repeatable.
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// File with one URL per line; blank lines and `#` comments are skipped.
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// Ignore cached responses and hit the network for every URL.
    #[arg(long)]
    force: bool,

    /// Ceiling on concurrent workers (overrides OYEZ_MAX_PARALLELISM).
    #[arg(long)]
    max_parallelism: Option<usize>,

    /// Throughput gain required to keep doubling (overrides OYEZ_MIN_IMPROVEMENT).
    #[arg(long)]
    min_improvement: Option<f64>,
}

/// Counts printed after a batch.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    succeeded: usize,
    cached: usize,
    failed: usize,
}

impl Summary {
    fn from_results(results: &[FetchResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match (result.success, result.from_cache) {
                (false, _) => summary.failed += 1,
                (true, true) => summary.cached += 1,
                (true, false) => summary.succeeded += 1,
            }
            summary
        })
    }
}

fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(PB_TEMPLATE) {
        bar.set_style(style.progress_chars("█▓▒░  "));
    }
    bar
}

pub async fn fetch(mut config: AppConfig, args: FetchArgs) -> Result<()> {
    if let Some(max_parallelism) = args.max_parallelism {
        config.max_parallelism = max_parallelism;
    }
    if let Some(min_improvement) = args.min_improvement {
        config.min_improvement = min_improvement;
    }
    config.validate()?;

    let mut urls = args.urls;
    if let Some(path) = &args.urls_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        urls.extend(parse_url_list(&text));
    }
    if urls.is_empty() {
        bail!("no URLs given; pass --url or --urls-file");
    }

    let requests = urls.iter().map(Request::new).collect::<Result<Vec<_>, _>>()?;
    let fetcher = AdaptiveFetcher::create(&config.cache_dir, FetcherConfig::from(&config)).await?;

    let bar = progress_bar();
    let mut on_progress = |progress: Progress<'_>| {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.completed as u64);
        bar.set_message(format!("{} workers", progress.workers));
    };
    let results = fetcher
        .fetch_batch_adaptive(requests, Some(&mut on_progress), args.force)
        .await;
    bar.finish_and_clear();

    for result in results.iter().filter(|r| !r.success) {
        println!("FAILED {} ({})", result.url, result.error.as_deref().unwrap_or("unknown error"));
    }

    let summary = Summary::from_results(&results);
    println!("{} succeeded, {} cached, {} failed", summary.succeeded, summary.cached, summary.failed);
    Ok(())
}

pub async fn clear_expired(config: &AppConfig) -> Result<()> {
    let cache = FileCache::open(&config.cache_dir, config.ttl_days).await?;
    let removed = cache.clear_expired().await?;
    println!("removed {removed} expired entries from {}", config.cache_dir.display());
    Ok(())
}
