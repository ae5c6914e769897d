//! Local lexicon sentiment classifier.
//!
//! Deterministic fallback for when no classification-service credential is
//! configured: counts bullish and bearish keyword hits in a post title and
//! turns the dominant polarity's share into a confidence. Always available,
//! never fails.

use crate::config::CrawlerConfig;
use crate::models::{AnalysisResult, Sentiment, Signal, clamp_confidence};

/// Keyword-counting classifier over configurable word lists.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    positive_words: Vec<String>,
    negative_words: Vec<String>,
    /// Confidence a polarity must exceed before the signal leaves `hold`.
    signal_threshold: f64,
}

impl LexiconClassifier {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            positive_words: config.positive_words.clone(),
            negative_words: config.negative_words.clone(),
            signal_threshold: config.signal_threshold,
        }
    }

    /// Score one title. Deterministic: identical input always yields an
    /// identical result.
    pub fn classify(&self, title: &str) -> AnalysisResult {
        let title_lower = title.to_lowercase();
        let hits = |words: &[String]| {
            words
                .iter()
                .filter(|word| title_lower.contains(word.as_str()))
                .count()
        };
        let positive = hits(&self.positive_words);
        let negative = hits(&self.negative_words);
        let total = positive + negative;

        if total == 0 {
            return AnalysisResult::neutral_default("未检测到明显情感词汇");
        }

        if positive > negative {
            let confidence = clamp_confidence(positive as f64 / total as f64);
            AnalysisResult {
                sentiment: Sentiment::Positive,
                confidence,
                signal: if confidence > self.signal_threshold {
                    Signal::Buy
                } else {
                    Signal::Hold
                },
                reason: format!("检测到{positive}个积极词汇，情绪偏乐观"),
                urgency: None,
            }
        } else if negative > positive {
            let confidence = clamp_confidence(negative as f64 / total as f64);
            AnalysisResult {
                sentiment: Sentiment::Negative,
                confidence,
                signal: if confidence > self.signal_threshold {
                    Signal::Sell
                } else {
                    Signal::Hold
                },
                reason: format!("检测到{negative}个消极词汇，情绪偏悲观"),
                urgency: None,
            }
        } else {
            AnalysisResult::neutral_default("多空情绪平衡")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LexiconClassifier {
        LexiconClassifier::from_config(&CrawlerConfig::default())
    }

    #[test]
    fn test_bullish_title_signals_buy() {
        let result = classifier().classify("大涨，利好，建议买入");
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.signal, Signal::Buy);
        assert!(result.confidence > 0.7);
        assert!(result.confidence <= 0.95);
    }

    #[test]
    fn test_bearish_title_signals_sell() {
        let result = classifier().classify("建议卖出，风险极大");
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.signal, Signal::Sell);
        assert!(result.confidence > 0.7);
    }

    #[test]
    fn test_no_keyword_hits_is_neutral() {
        let result = classifier().classify("今天天气不错，适合出门散步");
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_balanced_hits_hold_at_half() {
        // one bullish (利好), one bearish (风险)
        let result = classifier().classify("虽有利好但风险犹存");
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_weak_majority_stays_hold() {
        // two bullish (利好, 增长) against one bearish (风险): 2/3 < 0.7
        let result = classifier().classify("利好推动增长，但仍有风险");
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.signal, Signal::Hold);
        assert!(result.confidence < 0.7);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = classifier();
        let title = "突破在即，主力加仓，看好后市";
        let a = classifier.classify(title);
        let b = classifier.classify(title);
        assert_eq!(a.sentiment, b.sentiment);
        assert_eq!(a.signal, b.signal);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn test_confidence_never_exceeds_cap() {
        // all hits one-sided drives the raw share to 1.0
        let result = classifier().classify("暴涨突破创新高，利好买入加仓");
        assert_eq!(result.confidence, 0.95);
    }
}
