//! Data models for forum posts and their sentiment analyses.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Post`]: One forum entry extracted from a listing page
//! - [`AnalysisResult`]: The sentiment verdict for a single post title
//! - [`SignalAggregate`]: The weighted reduction of many verdicts into one
//!   overall trading recommendation
//! - Enums: [`Sentiment`], [`Signal`], [`Urgency`]
//!
//! The enums use lowercase serde renames (`"positive"`, `"buy"`, `"high"`)
//! to match the JSON shape the classification service is prompted to return.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound applied to every confidence value to avoid false certainty.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Clamp a raw confidence into the `[0, MAX_CONFIDENCE]` range.
pub fn clamp_confidence(confidence: f64) -> f64 {
    confidence.clamp(0.0, MAX_CONFIDENCE)
}

/// One forum entry as extracted from a listing page.
///
/// Created by the extraction cascade and immutable afterward. The validity
/// precondition at creation time is a non-empty title longer than 5
/// characters; shorter anchors are navigation noise, not posts.
///
/// Engagement counters are parsed from locale-formatted text (`1.2万`,
/// `3亿`); `time` is kept as raw source text because the forum renders
/// relative dates that are not worth normalizing at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// The post title; dedup key after whitespace normalization.
    pub title: String,
    /// Absolute URL of the post.
    pub link: String,
    /// Read counter as shown on the listing row.
    pub read_count: u64,
    /// Comment counter as shown on the listing row.
    pub comment_count: u64,
    /// Author display name; `未知` when the source row carries none.
    pub author: String,
    /// Raw post time text from the source (e.g. `08-07 21:15`).
    pub time: String,
    /// Listing page index the post was found on.
    pub page: u32,
    /// Capture instant, `%Y-%m-%d %H:%M:%S` local time.
    pub crawl_time: String,
}

impl Post {
    /// Combined read + comment count, used for ranking and weighting.
    pub fn engagement(&self) -> u64 {
        self.read_count + self.comment_count
    }
}

/// Sentiment polarity of one post title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete trading-style recommendation derived from sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How time-critical the classification service judged a post to be.
///
/// Only the remote strategy produces this; the lexicon strategy leaves it
/// unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        })
    }
}

/// Sentiment verdict for a single post title.
///
/// This is also the JSON shape the classification service is prompted to
/// return, so it doubles as the deserialization target for remote replies.
/// `sentiment`, `confidence`, `signal` and `reason` are required there;
/// a reply missing any of them is rejected and retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Sentiment,
    /// Always within `[0, 0.95]` after [`clamp_confidence`] is applied.
    pub confidence: f64,
    pub signal: Signal,
    /// Explanatory text for the verdict.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

impl AnalysisResult {
    /// The defined degenerate verdict: neutral, hold, coin-flip confidence.
    pub fn neutral_default(reason: impl Into<String>) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            confidence: 0.5,
            signal: Signal::Hold,
            reason: reason.into(),
            urgency: None,
        }
    }
}

/// One analyzed post together with its verdict and engagement weight.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedVote {
    pub post: Post,
    pub analysis: AnalysisResult,
    /// `engagement / 1000 + 1`, always >= 1.
    pub weight: f64,
}

/// The weighted reduction of all analyzed posts into one recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct SignalAggregate {
    pub overall_signal: Signal,
    /// Share of the winning class in the weighted vote mass, capped at 0.95.
    pub overall_confidence: f64,
    /// The posts actually analyzed, in analysis order.
    pub votes: Vec<WeightedVote>,
}
