//! Chain Assembler
//!
//! Splits a derivation at the edited step, builds the edit conversation and
//! joins the untouched prefix with the regenerated suffix. Prefix steps are
//! passed through as received; they are never re-executed.

use proof_cascade_core::ProofStep;

use super::conversation::Conversation;
use super::prompts::{update_prompt, SYSTEM_PROMPT};
use crate::utils::error::{AppError, AppResult};

/// Steps strictly before `edit_index` (1-based). The index must point at an
/// existing step.
pub fn split_prefix(steps: &[ProofStep], edit_index: u32) -> AppResult<&[ProofStep]> {
    let position = edit_index as usize;
    if position == 0 || position > steps.len() {
        return Err(AppError::validation(format!(
            "edit_index {} is out of range for a chain of {} step(s)",
            edit_index,
            steps.len()
        )));
    }
    Ok(&steps[..position - 1])
}

/// Conversation asking the generator to judge the edit and, if it holds,
/// continue the derivation from it.
pub fn edit_conversation(
    problem: &str,
    prefix: &[ProofStep],
    edit_index: u32,
    new_content: &str,
) -> Conversation {
    Conversation::new(
        SYSTEM_PROMPT,
        update_prompt(problem, prefix, edit_index, new_content),
    )
}

/// Prefix followed by the generated suffix.
pub fn assemble(prefix: &[ProofStep], suffix: Vec<ProofStep>) -> Vec<ProofStep> {
    let mut chain = Vec::with_capacity(prefix.len() + suffix.len());
    chain.extend_from_slice(prefix);
    chain.extend(suffix);
    chain
}
