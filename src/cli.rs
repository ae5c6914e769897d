//! Command-line interface definitions for the Guba signal crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The classification credential can be provided via flag or environment
//! variable; its absence disables the remote strategy entirely.

use clap::Parser;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl three pages of the default stock and analyze the top 10 posts
/// guba_signal -o ./out
///
/// # A different stock, deeper crawl, remote classification
/// guba_signal -s 600519 --start-page 1 --end-page 5 --api-key sk-...
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Stock code whose forum board is crawled
    #[arg(short, long, default_value = "002594")]
    pub stock_code: String,

    /// First listing page to fetch (inclusive)
    #[arg(long, default_value_t = 1)]
    pub start_page: u32,

    /// Last listing page to fetch (inclusive)
    #[arg(long, default_value_t = 3)]
    pub end_page: u32,

    /// Attempts per page before giving up on it
    #[arg(long, default_value_t = 5)]
    pub max_retries: usize,

    /// How many of the most-engaged posts to analyze
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,

    /// Output directory for the CSV dump and JSON report
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Classification-service credential; omit to use the local lexicon
    #[arg(long, env = "DEEPSEEK_API_KEY")]
    pub api_key: Option<String>,

    /// Optional path to a YAML file overriding tuned crawler constants
    #[arg(short, long)]
    pub config: Option<String>,
}
