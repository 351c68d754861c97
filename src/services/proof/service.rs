//! Proof Service
//!
//! The two operations the transport exposes: a fresh derivation and an edit
//! of an existing one. Request shape is checked here; every generation fault
//! is absorbed by the repair loop and comes back as an error-status step.

use std::sync::Arc;

use tracing::info;

use proof_cascade_core::ProofStep;
use proof_cascade_llm::LlmProvider;

use super::controller::RepairController;
use super::conversation::Conversation;
use super::editor::{assemble, edit_conversation, split_prefix};
use super::prompts::{solve_prompt, SYSTEM_PROMPT};
use super::requester::PlanRequester;
use crate::models::settings::GenerationConfig;
use crate::models::UpdateStepRequest;
use crate::utils::error::{AppError, AppResult};

pub struct ProofService {
    controller: RepairController,
}

impl ProofService {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &GenerationConfig) -> Self {
        let requester = PlanRequester::new(provider, config.temperature);
        Self {
            controller: RepairController::new(requester, config.max_retries),
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        self.controller.requester().provider()
    }

    /// Derive a solution from scratch, indexed from 1.
    pub async fn solve(&self, problem: &str) -> AppResult<Vec<ProofStep>> {
        let problem = non_empty_problem(problem)?;
        info!(problem, "solving");

        let conversation = Conversation::new(SYSTEM_PROMPT, solve_prompt(problem));
        Ok(self.controller.generate(conversation, 1).await)
    }

    /// Replace the content of one step and regenerate everything after it.
    pub async fn update_step(&self, request: &UpdateStepRequest) -> AppResult<Vec<ProofStep>> {
        let problem = non_empty_problem(&request.problem)?;
        let prefix = split_prefix(&request.current_steps, request.edit_index)?;
        info!(
            edit_index = request.edit_index,
            prefix = prefix.len(),
            "updating step"
        );

        let conversation =
            edit_conversation(problem, prefix, request.edit_index, &request.new_content);
        let suffix = self
            .controller
            .generate(conversation, request.edit_index)
            .await;
        Ok(assemble(prefix, suffix))
    }
}

fn non_empty_problem(problem: &str) -> AppResult<&str> {
    let trimmed = problem.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("problem must not be empty"));
    }
    Ok(trimmed)
}
