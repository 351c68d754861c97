//! DeepSeek Provider
//!
//! Implementation of the LlmProvider trait for DeepSeek's OpenAI-compatible API.
//! Supports deepseek-chat and the reasoner models, whose `<think>` blocks are
//! split off from the answer text.

use async_trait::async_trait;

use super::openai::{build_chat_body, parse_chat_response, post_chat_completion};
use super::provider::{missing_api_key_error, LlmProvider};
use super::types::{LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig};
use crate::http_client::build_http_client;

/// Default DeepSeek API endpoint
const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// DeepSeek provider
pub struct DeepSeekProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl DeepSeekProvider {
    /// Create a new DeepSeek provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(&config)?;
        Ok(Self { config, client })
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEEPSEEK_API_URL)
    }

    /// Check if model emits reasoning (R1 models)
    fn model_supports_thinking(&self) -> bool {
        let model = self.config.model.to_lowercase();
        model.contains("r1") || model.contains("reasoner")
    }
}

/// Split `<think>...</think>` blocks out of `content`.
///
/// Returns `(thinking, text)`; either side is `None` when empty. An unclosed
/// `<think>` swallows the rest of the content.
fn extract_thinking(content: &str) -> (Option<String>, Option<String>) {
    let mut thinking = String::new();
    let mut text = String::new();
    let mut rest = content;

    while let Some(open) = rest.find(THINK_OPEN) {
        text.push_str(&rest[..open]);
        let after_open = &rest[open + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(close) => {
                thinking.push_str(&after_open[..close]);
                rest = &after_open[close + THINK_CLOSE.len()..];
            }
            None => {
                thinking.push_str(after_open);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    let non_empty = |s: String| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };
    (non_empty(thinking), non_empty(text))
}

#[async_trait]
impl LlmProvider for DeepSeekProvider {
    fn name(&self) -> &'static str {
        "deepseek"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("deepseek"))?;

        let body = build_chat_body(
            &self.config,
            &messages,
            system.as_deref(),
            &request_options,
            true,
        );

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let envelope =
            post_chat_completion(&self.client, self.base_url(), api_key, &body, "deepseek")
                .await?;
        let mut response = parse_chat_response(&envelope, &self.config.model);

        if self.model_supports_thinking() {
            if let Some(raw) = response.content.take() {
                let (think, text) = extract_thinking(&raw);
                response.thinking = response.thinking.or(think);
                response.content = text;
            }
        }

        Ok(response)
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
