//! Test Support
//!
//! A scripted `LlmProvider` that replays queued responses in order and
//! records every conversation it receives. No network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use proof_cascade::models::settings::GenerationConfig;
use proof_cascade::ProofService;
use proof_cascade_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Fail(LlmError),
}

/// A call as the provider saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub options: LlmRequestOptions,
}

pub struct ScriptedProvider {
    config: ProviderConfig,
    script: Mutex<VecDeque<Scripted>>,
    /// Answer used once the script runs out
    fallback: Option<Scripted>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answers `response` to every request.
    pub fn always(response: Scripted) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::default(),
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            system,
            messages,
            options: request_options,
        });

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(Scripted::Text(text)) => Ok(LlmResponse::text(text, "scripted-model")),
            Some(Scripted::Fail(err)) => Err(err),
            None => Err(LlmError::Other {
                message: "script exhausted".to_string(),
            }),
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// A plan response from `(content, code, status)` triples.
pub fn plan(steps: &[(&str, &str, &str)]) -> Scripted {
    let steps: Vec<serde_json::Value> = steps
        .iter()
        .map(|(content, code, status)| json!({ "content": content, "code": code, "status": status }))
        .collect();
    Scripted::Text(json!({ "steps": steps }).to_string())
}

pub fn text(body: &str) -> Scripted {
    Scripted::Text(body.to_string())
}

pub fn service_with(provider: Arc<ScriptedProvider>, max_retries: u32) -> ProofService {
    let config = GenerationConfig {
        max_retries,
        ..GenerationConfig::default()
    };
    ProofService::new(provider, &config)
}

/// A verified derivative plan for `x**2`.
pub fn derivative_plan() -> Scripted {
    plan(&[
        (
            "Let $f(x) = x^2$.",
            "x = sp.symbols('x')\nf = x**2\nprint(sp.latex(f))",
            "normal",
        ),
        (
            "Differentiating gives $$f'(x) = 2x$$",
            "df = sp.diff(f, x)\nprint(sp.latex(df))",
            "normal",
        ),
    ])
}
