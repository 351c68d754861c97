//! Proof Request Models
//!
//! Wire shapes of the two proof operations.

use serde::{Deserialize, Serialize};

use proof_cascade_core::ProofStep;

/// Body of `POST /api/solve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub problem: String,
}

/// Body of `POST /api/update_step`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStepRequest {
    /// The chain as the caller last received it
    pub current_steps: Vec<ProofStep>,
    /// 1-based position of the edited step
    pub edit_index: u32,
    /// The user's replacement content for that step
    pub new_content: String,
    /// The original problem statement
    pub problem: String,
}

/// Response of both proof operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepsResponse {
    pub steps: Vec<ProofStep>,
}

impl From<Vec<ProofStep>> for StepsResponse {
    fn from(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }
}
