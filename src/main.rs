//! # News Bite
//!
//! A resilient news aggregation pipeline: fetch top headlines, summarize each
//! story into three bullet points with an LLM, and serve the batch from a
//! tiered TTL cache. When the live listing fails, a static dataset is served
//! instead, so a digest is always produced.
//!
//! ## Usage
//!
//! ```sh
//! NEWS_API_KEY=... OPENROUTER_API_KEY=... news_bite -j ./json
//! ```
//!
//! ## Architecture
//!
//! 1. **Cache**: a fresh cached batch is returned immediately
//! 2. **Listing**: otherwise top headlines are fetched from NewsAPI
//! 3. **Enrichment**: every item is summarized through a bounded pool
//! 4. **Fallback**: if the listing fails, the static dataset is served
//! 5. **Output**: the batch is written as a dated JSON digest

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cache;
mod cli;
mod config;
mod error;
mod extract;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod utils;

use cli::Cli;
use models::Digest;
use outputs::json;
use utils::{ensure_writable_dir, time_of_day};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_bite starting up");

    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.config, refresh = args.refresh, status = args.status, "Parsed CLI arguments");

    let mut config = config::load_config(args.config.as_deref())?;
    args.apply_to(&mut config);

    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    let aggregator = pipeline::build_aggregator(&config)?;

    if args.clear_cache {
        aggregator.clear_cache();
        return Ok(());
    }

    if args.status {
        let status = aggregator.cache_status();
        let report = serde_json::json!({
            "cache_key": config.cache.key,
            "cached": status.cached,
            "expires_at": status.expires_at.map(|t| t.to_rfc3339()),
            "remaining_secs": status.remaining.map(|d| d.as_secs()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let outcome = if args.refresh {
        aggregator.refresh().await
    } else {
        aggregator.latest().await
    };

    let now = Local::now();
    let digest = Digest {
        local_date: now.date_naive().to_string(),
        time_of_day: time_of_day(),
        local_time: now.time().format("%H:%M:%S").to_string(),
        origin: outcome.origin,
        articles: outcome.items,
    };
    info!(
        time_of_day = %digest.time_of_day,
        local_date = %digest.local_date,
        origin = %digest.origin,
        articles = digest.articles.len(),
        "Digest ready"
    );

    match &args.json_output_dir {
        Some(dir) => {
            json::write_digest(&digest, dir).await?;
        }
        None => println!("{}", serde_json::to_string_pretty(&digest)?),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
