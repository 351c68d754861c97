//! OpenAI Provider
//!
//! Implementation of the LlmProvider trait for OpenAI's chat-completions API.
//! The wire helpers here are shared with every OpenAI-compatible provider.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, ResponseFormat,
    StopReason, UsageStats,
};
use crate::http_client::build_http_client;

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(&config)?;
        Ok(Self { config, client })
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    /// Check if model is a reasoning model (o1/o3), which rejects `temperature`
    fn model_supports_reasoning(&self) -> bool {
        let model = self.config.model.to_lowercase();
        model.starts_with("o1") || model.starts_with("o3")
    }
}

/// Build an OpenAI-compatible chat-completions request body.
pub(crate) fn build_chat_body(
    config: &ProviderConfig,
    messages: &[Message],
    system: Option<&str>,
    request_options: &LlmRequestOptions,
    include_temperature: bool,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "stream": false,
    });

    // without an override the service default applies
    let temperature = request_options
        .temperature_override
        .filter(|_| include_temperature);
    if let Some(temperature) = temperature {
        body["temperature"] = serde_json::json!(temperature);
    }

    if request_options.response_format == ResponseFormat::JsonObject {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }

    let mut wire_messages: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);
    if let Some(sys) = system {
        wire_messages.push(serde_json::json!({
            "role": "system",
            "content": sys
        }));
    }
    // Diagnostic system turns stay in conversation order.
    for msg in messages {
        wire_messages.push(serde_json::json!({
            "role": msg.role.as_str(),
            "content": msg.content
        }));
    }
    body["messages"] = serde_json::json!(wire_messages);

    body
}

/// POST a chat-completions body and decode the response envelope.
pub(crate) async fn post_chat_completion(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    provider: &str,
) -> LlmResult<ChatCompletionResponse> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

    let status = response.status().as_u16();
    let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
        message: e.to_string(),
    })?;

    if status != 200 {
        return Err(parse_http_error(status, &body_text, provider));
    }

    serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
        message: format!("Failed to parse response: {}", e),
    })
}

/// Convert a decoded envelope into an `LlmResponse`.
pub(crate) fn parse_chat_response(
    response: &ChatCompletionResponse,
    fallback_model: &str,
) -> LlmResponse {
    let choice = response.choices.first();

    let mut content = None;
    let mut thinking = None;
    if let Some(msg) = choice.and_then(|c| c.message.as_ref()) {
        content = msg.content.clone().filter(|c| !c.trim().is_empty());
        thinking = msg.reasoning_content.clone();
    }

    let stop_reason = choice
        .and_then(|c| c.finish_reason.as_ref())
        .map(|r| StopReason::from(r.as_str()))
        .unwrap_or(StopReason::EndTurn);

    let usage = response
        .usage
        .as_ref()
        .map(|u| UsageStats {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    LlmResponse {
        content,
        thinking,
        stop_reason,
        usage,
        model: response
            .model
            .clone()
            .unwrap_or_else(|| fallback_model.to_string()),
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
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
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let body = build_chat_body(
            &self.config,
            &messages,
            system.as_deref(),
            &request_options,
            !self.model_supports_reasoning(),
        );

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let response =
            post_chat_completion(&self.client, self.base_url(), api_key, &body, "openai").await?;
        Ok(parse_chat_response(&response, &self.config.model))
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// OpenAI-compatible chat-completions response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageRole, ProviderType};

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            provider: ProviderType::OpenAI,
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new(test_config()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
        assert!(!provider.model_supports_reasoning());
        assert_eq!(provider.base_url(), OPENAI_API_URL);
    }

    #[test]
    fn test_build_chat_body_json_mode() {
        let config = test_config();
        let messages = vec![
            Message::user("Differentiate x^2"),
            Message::assistant("{\"steps\": []}"),
            Message::system("Code Error: step 1: NameError: name 'y' is not defined"),
        ];
        let options = LlmRequestOptions {
            temperature_override: Some(0.3),
            response_format: ResponseFormat::JsonObject,
        };

        let body = build_chat_body(&config, &messages, Some("be rigorous"), &options, true);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);

        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "be rigorous");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[3]["role"], MessageRole::System.as_str());
    }

    #[test]
    fn test_build_chat_body_without_temperature() {
        let body = build_chat_body(
            &test_config(),
            &[Message::user("hi")],
            None,
            &LlmRequestOptions::default(),
            false,
        );
        assert!(body.get("temperature").is_none());
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);

        let body = build_chat_body(
            &test_config(),
            &[Message::user("hi")],
            None,
            &LlmRequestOptions::default(),
            true,
        );
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"content": "{\"steps\": []}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        }"#;
        let envelope: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let response = parse_chat_response(&envelope, "gpt-4o");
        assert_eq!(response.content.as_deref(), Some("{\"steps\": []}"));
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total_tokens(), 17);
        assert_eq!(response.model, "gpt-4o-2024-08-06");
    }

    #[test]
    fn test_parse_chat_response_blank_content() {
        let raw = r#"{"choices": [{"message": {"content": "   "}, "finish_reason": "length"}]}"#;
        let envelope: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let response = parse_chat_response(&envelope, "gpt-4o");
        assert!(response.content.is_none());
        assert!(response.is_truncated());
        assert_eq!(response.model, "gpt-4o");
    }
}
