//! Weighted reduction of per-post verdicts into one trading signal.
//!
//! The most-engaged posts get classified and their confidences are weighted
//! by engagement, so one viral post outweighs a page of idle chatter. The
//! reduction itself is a pure function of the collected votes.

use crate::api::SentimentClassifier;
use crate::models::{MAX_CONFIDENCE, Post, Signal, SignalAggregate, WeightedVote};
use itertools::Itertools;
use std::cmp::Reverse;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Engagement weight of one post: `engagement / 1000 + 1`, always >= 1 and
/// monotone in engagement.
pub fn engagement_weight(post: &Post) -> f64 {
    post.engagement() as f64 / 1000.0 + 1.0
}

/// Select the `top_n` most-engaged posts, classify each, and reduce the
/// weighted votes to one overall signal.
///
/// Input posts are not mutated; the only side effect is classifier cache
/// population. `analysis_pause` spaces remote calls so the classification
/// service is not hammered; the lexicon path skips it.
#[instrument(level = "info", skip_all, fields(posts = posts.len(), top_n = top_n))]
pub async fn aggregate(
    posts: &[Post],
    top_n: usize,
    classifier: &mut SentimentClassifier,
    analysis_pause: Duration,
) -> SignalAggregate {
    let ranked: Vec<&Post> = posts
        .iter()
        .sorted_by_key(|post| Reverse(post.engagement()))
        .take(top_n)
        .collect();

    let mut votes = Vec::with_capacity(ranked.len());
    for (index, post) in ranked.iter().enumerate() {
        if index > 0 && classifier.is_remote() && !analysis_pause.is_zero() {
            sleep(analysis_pause).await;
        }
        let analysis = classifier.classify(&post.title).await;
        let weight = engagement_weight(post);
        debug!(
            title = %post.title,
            signal = %analysis.signal,
            confidence = analysis.confidence,
            weight,
            "Analyzed post"
        );
        votes.push(WeightedVote {
            post: (*post).clone(),
            analysis,
            weight,
        });
    }

    let (overall_signal, overall_confidence) = reduce_votes(&votes);
    info!(
        analyzed = votes.len(),
        signal = %overall_signal,
        confidence = overall_confidence,
        "Aggregated trading signal"
    );
    SignalAggregate {
        overall_signal,
        overall_confidence,
        votes,
    }
}

/// Reduce weighted votes to `(signal, confidence)`.
///
/// Each class accumulates `confidence x weight`; shares are normalized by
/// the grand total. The strictly highest share wins, ties resolve to hold,
/// and a zero grand total (no posts, or all-zero confidence) is the defined
/// degenerate hold at 0.5.
pub fn reduce_votes(votes: &[WeightedVote]) -> (Signal, f64) {
    let mut buy_score = 0.0;
    let mut sell_score = 0.0;
    let mut hold_score = 0.0;
    for vote in votes {
        let contribution = vote.analysis.confidence * vote.weight;
        match vote.analysis.signal {
            Signal::Buy => buy_score += contribution,
            Signal::Sell => sell_score += contribution,
            Signal::Hold => hold_score += contribution,
        }
    }

    let total = buy_score + sell_score + hold_score;
    if total == 0.0 {
        return (Signal::Hold, 0.5);
    }

    let buy_share = buy_score / total;
    let sell_share = sell_score / total;
    let hold_share = hold_score / total;

    if buy_share > sell_share && buy_share > hold_share {
        (Signal::Buy, buy_share.min(MAX_CONFIDENCE))
    } else if sell_share > buy_share && sell_share > hold_share {
        (Signal::Sell, sell_share.min(MAX_CONFIDENCE))
    } else {
        (Signal::Hold, hold_share.min(MAX_CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::models::{AnalysisResult, Sentiment};

    fn post(title: &str, read_count: u64, comment_count: u64) -> Post {
        Post {
            title: title.to_string(),
            link: String::new(),
            read_count,
            comment_count,
            author: "未知".to_string(),
            time: String::new(),
            page: 1,
            crawl_time: "2026-08-08 09:00:00".to_string(),
        }
    }

    fn vote(signal: Signal, confidence: f64, weight: f64) -> WeightedVote {
        WeightedVote {
            post: post("占位标题，仅供测试使用", 0, 0),
            analysis: AnalysisResult {
                sentiment: Sentiment::Neutral,
                confidence,
                signal,
                reason: String::new(),
                urgency: None,
            },
            weight,
        }
    }

    #[test]
    fn test_weight_is_monotone_in_engagement() {
        let hot = post("很多人围观的热门帖子", 120_000, 500);
        let cold = post("没有人理睬的冷门帖子", 40, 1);
        assert!(engagement_weight(&hot) >= engagement_weight(&cold));
        assert!(engagement_weight(&cold) >= 1.0);
    }

    #[test]
    fn test_reduce_picks_strictly_highest_share() {
        let votes = vec![
            vote(Signal::Buy, 0.9, 5.0),
            vote(Signal::Sell, 0.6, 1.0),
            vote(Signal::Hold, 0.5, 1.0),
        ];
        let (signal, confidence) = reduce_votes(&votes);
        assert_eq!(signal, Signal::Buy);
        let expected = (0.9 * 5.0) / (0.9 * 5.0 + 0.6 + 0.5);
        assert!((confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_tie_resolves_to_hold() {
        let votes = vec![vote(Signal::Buy, 0.8, 1.0), vote(Signal::Sell, 0.8, 1.0)];
        let (signal, confidence) = reduce_votes(&votes);
        assert_eq!(signal, Signal::Hold);
        // hold carried no vote mass in this tie
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_reduce_degenerate_is_hold_at_half() {
        assert_eq!(reduce_votes(&[]), (Signal::Hold, 0.5));
        let zeroed = vec![vote(Signal::Buy, 0.0, 3.0)];
        assert_eq!(reduce_votes(&zeroed), (Signal::Hold, 0.5));
    }

    #[test]
    fn test_reduce_confidence_is_capped() {
        let votes = vec![vote(Signal::Sell, 0.9, 4.0)];
        let (signal, confidence) = reduce_votes(&votes);
        assert_eq!(signal, Signal::Sell);
        assert_eq!(confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let votes = vec![
            vote(Signal::Buy, 0.7, 2.0),
            vote(Signal::Hold, 0.5, 1.5),
            vote(Signal::Sell, 0.4, 1.0),
        ];
        assert_eq!(reduce_votes(&votes), reduce_votes(&votes));
    }

    #[tokio::test]
    async fn test_aggregate_selects_most_engaged_posts() {
        let posts = vec![
            post("无人问津的中性标题帖子", 10, 0),
            post("大涨，利好，建议买入", 50_000, 300),
            post("建议卖出，风险极大", 20_000, 100),
        ];
        let mut classifier =
            SentimentClassifier::from_config(&CrawlerConfig::default(), None);
        let aggregate = aggregate(&posts, 2, &mut classifier, Duration::ZERO).await;

        assert_eq!(aggregate.votes.len(), 2);
        // analysis order follows engagement ranking
        assert_eq!(aggregate.votes[0].post.title, "大涨，利好，建议买入");
        assert_eq!(aggregate.votes[1].post.title, "建议卖出，风险极大");
        // bullish post carries more weight than the bearish one
        assert_eq!(aggregate.overall_signal, Signal::Buy);
        assert!(aggregate.overall_confidence <= MAX_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_aggregate_empty_input_is_degenerate_hold() {
        let mut classifier =
            SentimentClassifier::from_config(&CrawlerConfig::default(), None);
        let aggregate = aggregate(&[], 10, &mut classifier, Duration::ZERO).await;
        assert_eq!(aggregate.overall_signal, Signal::Hold);
        assert_eq!(aggregate.overall_confidence, 0.5);
        assert!(aggregate.votes.is_empty());
    }
}
