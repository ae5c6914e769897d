//! # Guba Signal
//!
//! A resilient content-acquisition pipeline that crawls EastMoney Guba
//! stock-forum listings through rate limiting and anti-bot defenses,
//! extracts structured posts from drifting HTML layouts, classifies post
//! sentiment, and aggregates everything into one weighted trading-style
//! recommendation.
//!
//! ## Features
//!
//! - Paced, identity-rotating page fetches with bounded retries and
//!   blocked/invalid response detection
//! - An ordered cascade of six extraction strategies with first-claim-wins
//!   title deduplication
//! - Sentiment classification via a local keyword lexicon or an optional
//!   remote chat-completions service (cached, retried, never fatal)
//! - Engagement-weighted reduction of per-post verdicts into a buy/sell/hold
//!   signal with bounded confidence
//! - CSV post dump (UTF-8 BOM) and JSON signal report
//!
//! ## Usage
//!
//! ```sh
//! guba_signal -s 002594 --end-page 3 -o ./out
//! ```
//!
//! ## Architecture
//!
//! The application follows a strictly sequential pipeline per session:
//! 1. **Fetching**: Download listing pages in ascending order, one request
//!    in flight at a time
//! 2. **Extraction**: Run the strategy cascade per page, deduplicating
//!    titles across the whole session
//! 3. **Analysis**: Classify the most-engaged posts and aggregate their
//!    weighted votes
//! 4. **Output**: Write the CSV dump and the JSON signal report

use clap::Parser;
use rand::{Rng, rng};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod extract;
mod fetch;
mod models;
mod outputs;
mod pacing;
mod sentiment;
mod signals;
mod utils;

use api::SentimentClassifier;
use cli::Cli;
use config::CrawlerConfig;
use extract::ContentExtractor;
use fetch::FetchClient;
use models::Post;
use outputs::{csv, report};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("guba_signal starting up");

    // Parse CLI and load tuned constants
    let args = Cli::parse();
    let config = Arc::new(CrawlerConfig::load(args.config.as_deref().map(Path::new))?);
    info!(
        stock_code = %args.stock_code,
        start_page = args.start_page,
        end_page = args.end_page,
        max_retries = args.max_retries,
        top_n = args.top_n,
        "Session configured"
    );

    // Early check: ensure the output dir is writable before spending minutes
    // on paced fetches
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Crawl pages in ascending order ----
    let mut fetcher = FetchClient::new(
        Arc::clone(&config),
        args.stock_code.clone(),
        args.max_retries,
    )?;
    let mut extractor = ContentExtractor::new(&config.base_url, &args.stock_code)?;

    let mut all_posts: Vec<Post> = Vec::new();
    let mut failed_pages = 0usize;
    for page in args.start_page..=args.end_page {
        match fetcher.fetch_page(page).await {
            Ok(markup) => {
                let posts = extractor.extract(&markup, page);
                if posts.is_empty() {
                    warn!(page, "Page yielded no posts");
                }
                all_posts.extend(posts);
            }
            Err(e) => {
                // Page-level failure only; the session continues.
                warn!(page, error = %e, "Page fetch failed; continuing with next page");
                failed_pages += 1;
            }
        }

        if page < args.end_page {
            let pause = rng().random_range(config.page_pause_secs.0..=config.page_pause_secs.1);
            sleep(Duration::from_secs_f64(pause)).await;
        }
    }
    info!(
        total = all_posts.len(),
        failed_pages,
        "Crawl finished"
    );
    if all_posts.is_empty() {
        warn!("Crawl produced no posts; the signal report will be the degenerate hold");
    }

    // ---- CSV dump ----
    if let Err(e) = csv::write_posts(&all_posts, &args.output_dir, &args.stock_code).await {
        error!(error = %e, "Failed to write post CSV");
    }

    // ---- Sentiment analysis and aggregation ----
    let mut classifier = SentimentClassifier::from_config(&config, args.api_key.clone());
    let analysis_pause = Duration::from_secs_f64(config.analysis_pause_secs);
    let aggregate =
        signals::aggregate(&all_posts, args.top_n, &mut classifier, analysis_pause).await;

    info!(
        signal = %aggregate.overall_signal,
        confidence = aggregate.overall_confidence,
        analyzed = aggregate.votes.len(),
        "Overall recommendation"
    );

    // ---- Signal report ----
    report::write_report(
        &aggregate,
        all_posts.len(),
        &args.output_dir,
        &args.stock_code,
    )
    .await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        posts = all_posts.len(),
        signal = %aggregate.overall_signal,
        "Execution complete"
    );

    Ok(())
}
