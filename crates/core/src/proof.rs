//! Proof Chain Model
//!
//! A derivation is an ordered chain of [`ProofStep`] values. Each step pairs a
//! human-readable explanation with a verification fragment and the captured
//! output of running that fragment in the sandbox.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Output recorded for a fragment that printed nothing.
pub const NO_OUTPUT_MARKER: &str = "\\text{No Output}";

/// Explanation carried by the synthesized step when every attempt failed.
pub const TERMINAL_ERROR_CONTENT: &str =
    "**Generation failed**: unable to build a valid proof path.";

/// Code carried by the synthesized terminal error step.
pub const TERMINAL_ERROR_CODE: &str = "# Error";

/// Output carried by the synthesized terminal error step.
pub const TERMINAL_ERROR_OUTPUT: &str = "\\text{Error}";

/// Lifecycle status of a proof step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Freshly generated and verified
    #[default]
    Normal,
    /// A user edit accepted as consistent with prior steps and the goal
    Valid,
    /// A rejected edit, or the terminal step after repair exhaustion
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Normal => "normal",
            StepStatus::Valid => "valid",
            StepStatus::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(StepStatus::Normal),
            "valid" => Ok(StepStatus::Valid),
            "error" => Ok(StepStatus::Error),
            other => Err(CoreError::parse(format!("unknown step status '{}'", other))),
        }
    }
}

/// One step of a derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// 1-based position in the assembled chain
    pub index: u32,
    /// Explanation, may embed `$...$` and `$$...$$` math
    pub content: String,
    /// Verification fragment run against the sandbox
    pub code: String,
    /// Captured output of `code`, never empty
    pub output: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl ProofStep {
    /// The single step returned once every generation attempt has failed.
    pub fn terminal_error(index: u32) -> Self {
        Self {
            index,
            content: TERMINAL_ERROR_CONTENT.to_string(),
            code: TERMINAL_ERROR_CODE.to_string(),
            output: TERMINAL_ERROR_OUTPUT.to_string(),
            status: StepStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}

/// Trim captured output, substituting the sentinel for blank output.
pub fn normalize_output(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        NO_OUTPUT_MARKER.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&StepStatus::Valid).unwrap(), "\"valid\"");
        let parsed: StepStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, StepStatus::Error);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Normal".parse::<StepStatus>().unwrap(), StepStatus::Normal);
        assert_eq!(" valid ".parse::<StepStatus>().unwrap(), StepStatus::Valid);
        assert_eq!(
            "maybe".parse::<StepStatus>().unwrap_err(),
            CoreError::parse("unknown step status 'maybe'")
        );
    }

    #[test]
    fn test_step_status_defaults_to_normal() {
        let json = r#"{"index":1,"content":"c","code":"print(1)","output":"1"}"#;
        let step: ProofStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.status, StepStatus::Normal);
    }

    #[test]
    fn test_terminal_error_step() {
        let step = ProofStep::terminal_error(4);
        assert_eq!(step.index, 4);
        assert!(step.is_error());
        assert_eq!(step.code, TERMINAL_ERROR_CODE);
        assert_eq!(step.output, TERMINAL_ERROR_OUTPUT);
    }

    #[test]
    fn test_normalize_output() {
        assert_eq!(normalize_output("  2 x\n"), "2 x");
        assert_eq!(normalize_output(" \n\t"), NO_OUTPUT_MARKER);
    }
}
