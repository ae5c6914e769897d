//! Remote sentiment classification over a chat-completions API.
//!
//! The remote strategy sends one post title per call and asks the model for
//! a strict JSON verdict matching [`AnalysisResult`]. Replies arrive as free
//! text, so the first balanced JSON object is carved out before parsing;
//! candidates missing required fields are rejected and retried. Failures
//! never propagate: after the retry budget the caller gets the neutral
//! default verdict.
//!
//! Verdicts are cached by normalized title for the lifetime of the session,
//! so re-analyzed posts cost nothing.

use crate::config::CrawlerConfig;
use crate::models::{AnalysisResult, Urgency, clamp_confidence};
use crate::sentiment::LexiconClassifier;
use crate::utils::{normalize_title, truncate_for_log};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Post-title sentiment scoring behind one contract.
///
/// Built from config: the remote strategy needs a service credential,
/// absence of one forces the lexicon fallback.
pub enum SentimentClassifier {
    Lexicon(LexiconClassifier),
    Remote(RemoteClassifier),
}

impl SentimentClassifier {
    pub fn from_config(config: &CrawlerConfig, api_key: Option<String>) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => {
                info!(model = %config.api_model, "Using remote sentiment classification");
                SentimentClassifier::Remote(RemoteClassifier::new(config, key))
            }
            _ => {
                info!("No classification credential; using lexicon fallback");
                SentimentClassifier::Lexicon(LexiconClassifier::from_config(config))
            }
        }
    }

    /// Score one title. Total: every failure mode degrades to a defined
    /// verdict rather than an error.
    pub async fn classify(&mut self, title: &str) -> AnalysisResult {
        match self {
            SentimentClassifier::Lexicon(lexicon) => lexicon.classify(title),
            SentimentClassifier::Remote(remote) => remote.classify(title).await,
        }
    }

    /// Whether per-call pacing applies between posts.
    pub fn is_remote(&self) -> bool {
        matches!(self, SentimentClassifier::Remote(_))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client with bounded retries and a session verdict cache.
pub struct RemoteClassifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_retries: usize,
    retry_delay: Duration,
    cache: HashMap<String, AnalysisResult>,
}

impl RemoteClassifier {
    pub fn new(config: &CrawlerConfig, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            model: config.api_model.clone(),
            max_retries: config.api_max_retries,
            retry_delay: Duration::from_secs(config.api_retry_delay_secs),
            cache: HashMap::new(),
        }
    }

    #[instrument(level = "info", skip_all)]
    pub async fn classify(&mut self, title: &str) -> AnalysisResult {
        let cache_key = normalize_title(title);
        if let Some(hit) = self.cache.get(&cache_key) {
            debug!(title = %truncate_for_log(title, 40), "Verdict served from cache");
            return hit.clone();
        }

        let prompt = build_prompt(title);
        for attempt in 1..=self.max_retries {
            match self.request_verdict(&prompt).await {
                Ok(verdict) => {
                    self.cache.insert(cache_key, verdict.clone());
                    return verdict;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        "Classification attempt failed"
                    );
                    if attempt < self.max_retries {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let mut fallback = AnalysisResult::neutral_default("API调用失败，使用默认分析");
        fallback.urgency = Some(Urgency::Low);
        fallback
    }

    async fn request_verdict(&self, prompt: &str) -> Result<AnalysisResult, String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "你是一个专业的股票市场分析师，擅长从论坛帖子中提取投资信号。",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 500,
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("transport: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status: {status}"));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("response shape: {e}"))?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or("");

        let object = extract_json_object(content).ok_or_else(|| {
            format!(
                "no JSON object in reply: {}",
                truncate_for_log(content, 120)
            )
        })?;
        let mut verdict: AnalysisResult = serde_json::from_str(object).map_err(|e| {
            format!(
                "verdict shape: {e} in {}",
                truncate_for_log(object, 120)
            )
        })?;
        verdict.confidence = clamp_confidence(verdict.confidence);
        Ok(verdict)
    }
}

/// Analysis prompt asking for a strict JSON verdict for one title.
fn build_prompt(title: &str) -> String {
    format!(
        r#"请分析以下股票论坛帖子的情感倾向，并给出交易建议：

帖子标题: "{title}"

请按以下JSON格式返回分析结果：
{{
    "sentiment": "positive/negative/neutral",
    "confidence": 0.0-1.0,
    "signal": "buy/sell/hold",
    "reason": "详细分析理由",
    "urgency": "high/medium/low"
}}

分析要点：
1. 识别关键词：利好、利空、买入、卖出、推荐、谨慎等
2. 判断情绪强度
3. 结合股票投资逻辑给出建议
4. 评估信息的紧急程度"#
    )
}

/// Carve the first balanced JSON object out of free text.
///
/// Tracks brace depth outside of strings and honors escapes inside them, so
/// reasons containing `{`/`}` or quotes do not break the scan. Returns
/// `None` when the first opening brace never balances.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
