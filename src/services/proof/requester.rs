//! Plan Requester
//!
//! Sends one conversation to the text-generation service and returns the raw
//! text it answered with. No retries and no interpretation happen here.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use proof_cascade_llm::{LlmError, LlmProvider, LlmRequestOptions, ResponseFormat};

use super::conversation::Conversation;

/// The generation call failed.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("generation request failed: {0}")]
    Provider(#[from] LlmError),

    #[error("generation service returned no text")]
    EmptyResponse,
}

pub struct PlanRequester {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl PlanRequester {
    pub fn new(provider: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self {
            provider,
            temperature,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Ask for a JSON plan continuing `conversation`.
    pub async fn request(&self, conversation: &Conversation) -> Result<String, ServiceError> {
        let options = LlmRequestOptions {
            temperature_override: Some(self.temperature),
            response_format: ResponseFormat::JsonObject,
        };

        debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            turns = conversation.len(),
            "requesting plan"
        );

        let response = self
            .provider
            .send_message(
                conversation.messages().to_vec(),
                Some(conversation.system().to_string()),
                options,
            )
            .await?;

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ServiceError::EmptyResponse),
        }
    }
}
