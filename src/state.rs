//! Application State
//!
//! Shared by every request handler. Requests share no mutable state: each one
//! builds its own conversation and its own sandbox session.

use std::sync::Arc;

use proof_cascade_llm::{create_provider, LlmProvider};

use crate::models::settings::AppConfig;
use crate::services::proof::ProofService;
use crate::utils::error::AppResult;

pub struct AppState {
    config: AppConfig,
    proof: ProofService,
}

impl AppState {
    /// Build the state with the provider selected by `config`.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let provider = create_provider(config.provider.clone())?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build the state around an existing provider.
    pub fn with_provider(config: AppConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let proof = ProofService::new(provider, &config.generation);
        Self { config, proof }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn proof(&self) -> &ProofService {
        &self.proof
    }
}
