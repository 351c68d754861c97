//! Retry/Repair Controller
//!
//! Owns the attempt loop of one generation request:
//!
//! ```text
//! Requesting -> Parsing -> Executing -> Success
//!      ^                        |
//!      +------ diagnostic ------+
//! ```
//!
//! Service and format failures abandon the attempt and leave the history
//! untouched. A verification failure appends the failed response and a
//! diagnostic turn, so the next attempt sees the mistake. When every attempt
//! fails the result is a single synthesized error step.

use tracing::{info, warn};

use proof_cascade_core::ProofStep;

use super::conversation::Conversation;
use super::executor::{execute_steps, VerificationError};
use super::parser::{parse_plan, PlanFormatError};
use super::requester::{PlanRequester, ServiceError};

/// How one attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    Verified(Vec<ProofStep>),
    ServiceFailure(ServiceError),
    FormatFailure(PlanFormatError),
    VerificationFailure {
        response: String,
        error: VerificationError,
    },
}

pub struct RepairController {
    requester: PlanRequester,
    max_attempts: u32,
}

impl RepairController {
    pub fn new(requester: PlanRequester, max_attempts: u32) -> Self {
        Self {
            requester,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn requester(&self) -> &PlanRequester {
        &self.requester
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run the loop and return steps indexed from `start_index`. Never fails:
    /// exhaustion yields [`ProofStep::terminal_error`].
    pub async fn generate(&self, mut conversation: Conversation, start_index: u32) -> Vec<ProofStep> {
        for attempt in 1..=self.max_attempts {
            match self.attempt(&conversation).await {
                AttemptOutcome::Verified(steps) => {
                    info!(attempt, steps = steps.len(), start_index, "plan verified");
                    return reindex(steps, start_index);
                }
                AttemptOutcome::ServiceFailure(err) => {
                    warn!(attempt, error = %err, "generation service failed");
                }
                AttemptOutcome::FormatFailure(err) => {
                    warn!(attempt, error = %err, "malformed plan");
                }
                AttemptOutcome::VerificationFailure { response, error } => {
                    warn!(
                        attempt,
                        step = error.step,
                        error = %error.error,
                        "verification failed"
                    );
                    conversation.push_failure(&response, &error.to_string());
                }
            }
        }

        warn!(
            attempts = self.max_attempts,
            start_index, "repair attempts exhausted"
        );
        vec![ProofStep::terminal_error(start_index)]
    }

    /// One Requesting -> Parsing -> Executing pass.
    pub async fn attempt(&self, conversation: &Conversation) -> AttemptOutcome {
        let response = match self.requester.request(conversation).await {
            Ok(text) => text,
            Err(err) => return AttemptOutcome::ServiceFailure(err),
        };

        let plan = match parse_plan(&response) {
            Ok(plan) => plan,
            Err(err) => return AttemptOutcome::FormatFailure(err),
        };

        match execute_steps(&plan) {
            Ok(steps) => AttemptOutcome::Verified(steps),
            Err(error) => AttemptOutcome::VerificationFailure { response, error },
        }
    }
}

/// Assign contiguous indices starting at `start_index`.
pub fn reindex(steps: Vec<ProofStep>, start_index: u32) -> Vec<ProofStep> {
    steps
        .into_iter()
        .zip(start_index..)
        .map(|(step, index)| ProofStep { index, ..step })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindex() {
        let steps = vec![ProofStep::terminal_error(0), ProofStep::terminal_error(0)];
        let indices: Vec<u32> = reindex(steps, 3).iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![3, 4]);
    }
}
