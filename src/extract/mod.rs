//! Post extraction from inconsistent listing markup.
//!
//! The forum's layout drifts between page variants, so extraction runs an
//! ordered cascade of independent strategies over the same document, from
//! the most structurally specific (the canonical article container) down to
//! a bare anchor-text fallback. Strategies are total: one that cannot parse
//! an item contributes nothing for it, never an error for the page.
//!
//! # Merge policy
//!
//! Strategies run in priority order and the first to claim a normalized
//! title wins; later, less specific strategies cannot overwrite an earlier
//! candidate. Accepted titles also feed a session-level seen set so a post
//! is never counted twice across repeated extraction calls.

mod strategies;

use crate::models::Post;
use crate::utils::{crawl_stamp, normalize_title};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

use strategies::{STRATEGIES, StrategyContext};

/// Author placeholder when a source row carries none.
pub(crate) const UNKNOWN_AUTHOR: &str = "未知";

/// Minimum title length (characters) for a candidate to count as a post.
pub(crate) const MIN_TITLE_CHARS: usize = 5;

static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Parse a locale-formatted counter (`1.2万`, `3亿`, `1234`) into a number.
///
/// `万` multiplies the leading decimal by 10 000 and `亿` by 100 000 000;
/// otherwise the first integer substring is used. Pure and total: anything
/// unparseable yields 0.
pub fn parse_number(text: &str) -> u64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }
    let scaled = |factor: f64| {
        DECIMAL_RE
            .find(text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|n| (n * factor).round() as u64)
            .unwrap_or(0)
    };
    if text.contains('万') {
        scaled(10_000.0)
    } else if text.contains('亿') {
        scaled(100_000_000.0)
    } else {
        INTEGER_RE
            .find(text)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    }
}

/// Session-scoped extractor: runs the cascade and deduplicates titles both
/// within a page and across the whole crawl.
pub struct ContentExtractor {
    base_url: Url,
    /// Hrefs of individual posts embed `news,{stock_code}`.
    link_pattern: Regex,
    seen_titles: HashSet<String>,
}

impl ContentExtractor {
    pub fn new(base_url: &str, stock_code: &str) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            link_pattern: Regex::new(&format!("news,{}", regex::escape(stock_code)))?,
            seen_titles: HashSet::new(),
        })
    }

    /// Extract the deduplicated post set from one page of markup.
    ///
    /// May be empty; an empty result is an extraction gap, not an error.
    #[instrument(level = "info", skip(self, html))]
    pub fn extract(&mut self, html: &str, page: u32) -> Vec<Post> {
        let document = Html::parse_document(html);
        let crawl_time = crawl_stamp();
        let context = StrategyContext {
            document: &document,
            base_url: &self.base_url,
            link_pattern: &self.link_pattern,
            page,
            crawl_time: &crawl_time,
        };

        let mut accepted: Vec<Post> = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();

        for (name, strategy) in STRATEGIES.iter().copied() {
            let candidates = strategy(&context);
            let mut added = 0usize;
            for post in candidates {
                let key = normalize_title(&post.title);
                if key.chars().count() <= MIN_TITLE_CHARS {
                    continue;
                }
                if self.seen_titles.contains(&key) || !claimed.insert(key) {
                    continue;
                }
                accepted.push(post);
                added += 1;
            }
            if added > 0 {
                debug!(strategy = name, added, "Strategy contributed posts");
            }
        }

        self.seen_titles.extend(claimed);
        info!(page, count = accepted.len(), "Extracted posts from page");
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_PAGE: &str = r#"
        <html><body>
        <div id="articlelistnew">
            <div class="articleh">
                <span class="l1">1.2万</span>
                <span class="l2">88</span>
                <span class="l3"><a href="/news,002594,100000001.html">比亚迪销量创新高，股价有望突破</a></span>
                <span class="l4">老股民</span>
                <span class="l5">08-07 21:15</span>
            </div>
            <div class="articleh">
                <span class="l1">3456</span>
                <span class="l2">12</span>
                <span class="l3"><a href="//guba.eastmoney.com/news,002594,100000002.html">利好不断，建议逢低加仓布局</a></span>
                <span class="l4">短线客</span>
                <span class="l5">08-07 20:02</span>
            </div>
        </div>
        <div class="title"><a href="/news,002594,100000001.html">比亚迪销量创新高，股价有望突破</a></div>
        </body></html>
    "#;

    const FALLBACK_ONLY_PAGE: &str = r#"
        <html><body>
        <div class="content">
            <div class="title"><a href="/news,002594,100000009.html">主力资金流入明显，关注后续走势</a></div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_number_magnitude_suffixes() {
        assert_eq!(parse_number("1.2万"), 12_000);
        assert_eq!(parse_number("3亿"), 300_000_000);
        assert_eq!(parse_number("1234"), 1234);
        assert_eq!(parse_number("约 567 次"), 567);
    }

    #[test]
    fn test_parse_number_is_total() {
        assert_eq!(parse_number(""), 0);
        assert_eq!(parse_number("abc"), 0);
        assert_eq!(parse_number("万"), 0);
        assert_eq!(parse_number("   "), 0);
    }

    #[test]
    fn test_canonical_page_extracts_full_rows() {
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let posts = extractor.extract(CANONICAL_PAGE, 1);
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.title, "比亚迪销量创新高，股价有望突破");
        assert_eq!(
            first.link,
            "https://guba.eastmoney.com/news,002594,100000001.html"
        );
        assert_eq!(first.read_count, 12_000);
        assert_eq!(first.comment_count, 88);
        assert_eq!(first.author, "老股民");
        assert_eq!(first.time, "08-07 21:15");
        assert_eq!(first.page, 1);

        // protocol-relative href resolved to absolute
        assert_eq!(
            posts[1].link,
            "https://guba.eastmoney.com/news,002594,100000002.html"
        );
    }

    #[test]
    fn test_first_claim_wins_over_weaker_strategies() {
        // The duplicate div.title entry carries no counters; the canonical
        // row's version must be the one kept.
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let posts = extractor.extract(CANONICAL_PAGE, 1);
        let post = posts
            .iter()
            .find(|p| p.title == "比亚迪销量创新高，股价有望突破")
            .unwrap();
        assert_eq!(post.read_count, 12_000);
    }

    #[test]
    fn test_fallback_strategy_recovers_without_canonical_container() {
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let posts = extractor.extract(FALLBACK_ONLY_PAGE, 2);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "主力资金流入明显，关注后续走势");
        assert_eq!(posts[0].read_count, 0);
        assert_eq!(posts[0].author, UNKNOWN_AUTHOR);
        assert_eq!(posts[0].page, 2);
    }

    #[test]
    fn test_extraction_is_idempotent_across_fresh_sessions() {
        let mut a = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let mut b = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let titles_a: Vec<_> = a.extract(CANONICAL_PAGE, 1).into_iter().map(|p| p.title).collect();
        let titles_b: Vec<_> = b.extract(CANONICAL_PAGE, 1).into_iter().map(|p| p.title).collect();
        assert_eq!(titles_a, titles_b);
    }

    #[test]
    fn test_session_seen_set_suppresses_repeat_extraction() {
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        let first = extractor.extract(CANONICAL_PAGE, 1);
        assert!(!first.is_empty());
        let second = extractor.extract(CANONICAL_PAGE, 1);
        assert!(second.is_empty(), "same titles must not be counted twice");
    }

    #[test]
    fn test_short_titles_are_rejected() {
        let html = r#"<div class="title"><a href="/news,002594,1.html">短标题</a></div>"#;
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        assert!(extractor.extract(html, 1).is_empty());
    }

    #[test]
    fn test_empty_markup_is_a_gap_not_an_error() {
        let mut extractor = ContentExtractor::new("https://guba.eastmoney.com", "002594").unwrap();
        assert!(extractor.extract("", 1).is_empty());
        assert!(extractor.extract("<html><body></body></html>", 1).is_empty());
    }
}
