//! HTTP fetching with identity rotation and bounded retries.
//!
//! The listing source throttles and bot-blocks, so each page fetch runs
//! through a retry loop that rotates the request identity (user-agent,
//! referrer, spoofed forwarded-for, optional proxy) between attempts and
//! classifies every response as blocked, invalid, or usable. Transport
//! errors, blocked responses and invalid content are treated identically at
//! the retry boundary; only the final outcome is visible to the caller.
//! Partial or garbled markup is never returned as success.

use crate::config::CrawlerConfig;
use crate::pacing::RequestPacer;
use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// What went wrong on the attempt that exhausted the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or timeout error before a body was available.
    Transport,
    /// Anti-automation defenses triggered.
    Blocked,
    /// A body arrived but carried none of the expected content markers.
    Invalid,
}

/// Page-level fetch failure. Non-fatal to the crawl: the session logs it
/// and moves on to the next page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch exhausted after {attempts} attempts (last failure: {last:?})")]
    Exhausted { attempts: usize, last: FailureKind },
}

/// Verdict for one HTTP response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Usable,
    Blocked,
    Invalid,
}

/// Classify a response against the anti-bot and content heuristics.
///
/// Blocked wins over valid: a challenge page that happens to echo the stock
/// code is still a challenge page. Lengths are measured in characters since
/// the thresholds were tuned against CJK pages.
pub fn classify_response(
    status: StatusCode,
    body: &str,
    stock_code: &str,
    config: &CrawlerConfig,
) -> ResponseClass {
    let char_len = body.chars().count();
    let body_lower = body.to_lowercase();

    let blocked = status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || char_len < config.min_body_len
        || config
            .blocked_markers
            .iter()
            .any(|marker| body_lower.contains(&marker.to_lowercase()));
    if blocked {
        return ResponseClass::Blocked;
    }

    let valid = config
        .content_markers
        .iter()
        .any(|marker| body.contains(marker.as_str()))
        || body.contains(stock_code)
        || char_len > config.valid_body_len;
    if valid {
        ResponseClass::Usable
    } else {
        ResponseClass::Invalid
    }
}

/// Issues one listing-page request at a time, pacing and retrying as needed.
pub struct FetchClient {
    config: Arc<CrawlerConfig>,
    pacer: RequestPacer,
    stock_code: String,
    max_retries: usize,
    /// Shared direct client; proxied attempts build their own.
    client: reqwest::Client,
}

impl FetchClient {
    pub fn new(
        config: Arc<CrawlerConfig>,
        stock_code: String,
        max_retries: usize,
    ) -> Result<Self, reqwest::Error> {
        let pacer = RequestPacer::from_config(&config);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            config,
            pacer,
            stock_code,
            max_retries,
            client,
        })
    }

    /// Listing URL for a page index: `list,{id}.html` for page 1,
    /// `list,{id}_{page}.html` beyond.
    pub fn listing_url(&self, page: u32) -> String {
        if page <= 1 {
            format!("{}/list,{}.html", self.config.base_url, self.stock_code)
        } else {
            format!(
                "{}/list,{}_{}.html",
                self.config.base_url, self.stock_code, page
            )
        }
    }

    /// Fetch one listing page, retrying up to the configured bound.
    ///
    /// Each attempt waits out the pacer, rotates identity, and classifies
    /// the response; anything other than usable markup counts as a failed
    /// attempt.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_page(&mut self, page: u32) -> Result<String, FetchError> {
        let url = self.listing_url(page);
        let mut last_failure = FailureKind::Transport;

        for attempt in 1..=self.max_retries {
            self.pacer.wait().await;

            let headers = self.request_headers(page, attempt);
            let client = match self.client_for_attempt() {
                Ok(client) => client,
                Err(e) => {
                    warn!(attempt, error = %e, "Proxy client construction failed");
                    last_failure = FailureKind::Transport;
                    continue;
                }
            };

            let response = match client.get(&url).headers(headers).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(attempt, max = self.max_retries, error = %e, "Request failed");
                    last_failure = FailureKind::Transport;
                    continue;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(attempt, error = %e, "Failed reading response body");
                    last_failure = FailureKind::Transport;
                    continue;
                }
            };

            match classify_response(status, &body, &self.stock_code, &self.config) {
                ResponseClass::Usable => {
                    info!(
                        page,
                        attempt,
                        bytes = body.len(),
                        requests = self.pacer.request_count(),
                        "Fetched listing page"
                    );
                    return Ok(body);
                }
                ResponseClass::Blocked => {
                    warn!(
                        attempt,
                        max = self.max_retries,
                        %status,
                        chars = body.chars().count(),
                        "Attempt blocked by anti-bot defenses"
                    );
                    last_failure = FailureKind::Blocked;
                }
                ResponseClass::Invalid => {
                    warn!(
                        attempt,
                        max = self.max_retries,
                        chars = body.chars().count(),
                        "Attempt returned content without expected markers"
                    );
                    last_failure = FailureKind::Invalid;
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: self.max_retries,
            last: last_failure,
        })
    }

    /// Pick the client for this attempt: a fresh proxied client when a pool
    /// is configured (reqwest fixes proxies at build time), the shared
    /// direct client otherwise.
    fn client_for_attempt(&self) -> Result<reqwest::Client, reqwest::Error> {
        let Some(proxy_url) = self.config.proxies.choose(&mut rng()) else {
            return Ok(self.client.clone());
        };
        debug!(proxy = %proxy_url, "Routing attempt through proxy");
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .proxy(reqwest::Proxy::all(proxy_url.as_str())?)
            .build()
    }

    /// Assemble the rotated browser identity for one attempt.
    ///
    /// Retries point the referrer at the previous page's listing so the
    /// navigation looks like paging, not polling.
    fn request_headers(&self, page: u32, attempt: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(agent) = self.config.user_agents.choose(&mut rng())
            && let Ok(value) = HeaderValue::from_str(agent)
        {
            headers.insert(USER_AGENT, value);
        }

        headers.insert(
            "Accept",
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            "Accept-Language",
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );
        headers.insert("Connection", HeaderValue::from_static("keep-alive"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
        headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));

        if let Ok(value) = HeaderValue::from_str(&spoofed_forwarded_for()) {
            headers.insert("X-Forwarded-For", value);
        }

        let referer = if attempt > 1 {
            self.listing_url(page.saturating_sub(1).max(1))
        } else {
            self.config.portal_referer.clone()
        };
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }

        headers
    }
}

/// Random plausible client chain for the `X-Forwarded-For` header.
fn spoofed_forwarded_for() -> String {
    let mut r = rng();
    format!(
        "{}.{}.{}.{}",
        r.random_range(1..=255u16),
        r.random_range(1..=255u16),
        r.random_range(1..=255u16),
        r.random_range(1..=255u16)
    )
}
