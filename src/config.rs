//! Crawler configuration: the empirically tuned knobs behind the pipeline.
//!
//! The blocked/valid heuristics, pacing windows, keyword lists and retry
//! bounds were tuned against the live site and carry no deeper rationale,
//! so they are kept as configuration rather than hardcoded semantics.
//! Every field has a default; an optional YAML file passed via `--config`
//! overrides only the fields it names.

use serde::Deserialize;
use std::error::Error;
use std::path::Path;

/// All tuned constants for one crawl session.
///
/// Deserialized with container-level `#[serde(default)]`, so a partial YAML
/// file is merged over the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Forum root; listing and post URLs are resolved against this.
    pub base_url: String,
    /// Referer sent on first attempts, pointing at the portal home.
    pub portal_referer: String,
    /// Browser fingerprints rotated per attempt.
    pub user_agents: Vec<String>,
    /// Optional proxy pool (`http://user:pass@ip:port`); empty means direct.
    pub proxies: Vec<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Minimum spacing between outbound requests, in seconds.
    pub min_request_interval_secs: f64,
    /// Uniform jitter range (seconds) added whenever the floor applies.
    pub jitter_secs: (f64, f64),
    /// Every Nth request triggers an additional long cool-down; 0 disables.
    pub long_break_every: u64,
    /// Cool-down range (seconds) for the periodic long break.
    pub long_break_secs: (f64, f64),
    /// Extra pause range (seconds) between listing pages.
    pub page_pause_secs: (f64, f64),

    /// Body substrings that mark a response as bot-blocked.
    pub blocked_markers: Vec<String>,
    /// Structural anchors whose presence marks a response as usable.
    pub content_markers: Vec<String>,
    /// Bodies shorter than this (characters) count as blocked.
    pub min_body_len: usize,
    /// Bodies longer than this (characters) count as usable even without markers.
    pub valid_body_len: usize,

    /// Bullish lexicon for the local classifier.
    pub positive_words: Vec<String>,
    /// Bearish lexicon for the local classifier.
    pub negative_words: Vec<String>,
    /// Confidence a polarity must exceed before it becomes buy/sell.
    pub signal_threshold: f64,

    /// Chat-completions endpoint for the remote classifier.
    pub api_url: String,
    /// Model name sent to the remote classifier.
    pub api_model: String,
    /// Remote call timeout in seconds.
    pub api_timeout_secs: u64,
    /// Attempts per title before degrading to the neutral default.
    pub api_max_retries: usize,
    /// Fixed delay between remote attempts, in seconds.
    pub api_retry_delay_secs: u64,
    /// Pause between per-post remote classifications, in seconds.
    pub analysis_pause_secs: f64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://guba.eastmoney.com".to_string(),
            portal_referer: "https://www.eastmoney.com/".to_string(),
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
                "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
            ]
            .map(String::from)
            .to_vec(),
            proxies: Vec::new(),
            request_timeout_secs: 15,

            min_request_interval_secs: 5.0,
            jitter_secs: (2.0, 6.0),
            long_break_every: 10,
            long_break_secs: (15.0, 30.0),
            page_pause_secs: (5.0, 10.0),

            blocked_markers: ["access denied", "forbidden", "验证", "反爬虫", "challenge"]
                .map(String::from)
                .to_vec(),
            content_markers: ["articlelistnew", "articleh"].map(String::from).to_vec(),
            min_body_len: 3000,
            valid_body_len: 5000,

            positive_words: [
                "看好", "推荐", "买入", "增长", "利好", "突破", "大涨", "持有", "加仓",
                "创新高", "超预期", "牛股", "暴涨",
            ]
            .map(String::from)
            .to_vec(),
            negative_words: [
                "卖出", "下跌", "利空", "谨慎", "观望", "调整", "风险", "亏损", "减持",
                "破位", "回调", "暴跌", "割肉", "跑路",
            ]
            .map(String::from)
            .to_vec(),
            signal_threshold: 0.7,

            api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_model: "deepseek-chat".to_string(),
            api_timeout_secs: 30,
            api_max_retries: 3,
            api_retry_delay_secs: 2,
            analysis_pause_secs: 1.0,
        }
    }
}

impl CrawlerConfig {
    /// Load the configuration, merging an optional YAML file over defaults.
    ///
    /// No path means pure defaults. A path that cannot be read or parsed is
    /// an error: the user asked for that file, silently ignoring it would
    /// run the crawl with the wrong thresholds.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                let config: Self = serde_yaml::from_str(&raw)?;
                Ok(config)
            }
        }
    }
}
