//! Step Executor
//!
//! Runs a plan's verification fragments in order against one fresh sandbox
//! session. A step counts as verified when its fragment runs without raising;
//! the printed value is not compared with the step's claim.

use thiserror::Error;
use tracing::{debug, trace};

use proof_cascade_core::{normalize_output, ProofStep};
use proof_cascade_sandbox::{SandboxError, Session};

use super::parser::PlannedStep;

/// A fragment raised. Execution stopped at `step`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("step {step}: {error}")]
pub struct VerificationError {
    /// 1-based position of the failing step within the plan
    pub step: usize,
    /// Steps that ran cleanly before the failure
    pub verified: Vec<ProofStep>,
    pub error: SandboxError,
}

/// Execute every step in plan order. Returned steps carry their output and
/// planned status; indices are left at 0 for the caller to assign.
pub fn execute_steps(steps: &[PlannedStep]) -> Result<Vec<ProofStep>, VerificationError> {
    let mut session = Session::new();
    let mut verified = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        trace!(step = i + 1, code = %step.code, "executing step");
        match session.run(&step.code) {
            Ok(printed) => {
                verified.push(ProofStep {
                    index: 0,
                    content: step.content.clone(),
                    code: step.code.clone(),
                    output: normalize_output(&printed),
                    status: step.status,
                });
            }
            Err(error) => {
                debug!(step = i + 1, error = %error, "verification failed");
                return Err(VerificationError {
                    step: i + 1,
                    verified,
                    error,
                });
            }
        }
    }

    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proof_cascade_core::{StepStatus, NO_OUTPUT_MARKER};
    use pretty_assertions::assert_eq;

    fn planned(code: &str) -> PlannedStep {
        PlannedStep {
            content: "step".to_string(),
            code: code.to_string(),
            status: StepStatus::Normal,
        }
    }

    #[test]
    fn test_later_steps_see_earlier_bindings() {
        let steps = vec![
            planned("x = sp.symbols('x')\nf = x**2\nprint(sp.latex(f))"),
            planned("print(sp.latex(sp.diff(f, x)))"),
        ];
        let verified = execute_steps(&steps).unwrap();
        assert_eq!(verified.len(), 2);
        assert_eq!(verified[0].output, "x^{2}");
        assert_eq!(verified[1].output, "2 x");
    }

    #[test]
    fn test_blank_output_gets_marker() {
        let verified = execute_steps(&[planned("x = sp.symbols('x')")]).unwrap();
        assert_eq!(verified[0].output, NO_OUTPUT_MARKER);
    }

    #[test]
    fn test_first_failure_stops_the_batch() {
        let steps = vec![
            planned("x = sp.symbols('x')\nprint(x)"),
            planned("print(y + 1)"),
            planned("print(1)"),
        ];
        let err = execute_steps(&steps).unwrap_err();
        assert_eq!(err.step, 2);
        assert_eq!(err.verified.len(), 1);
        assert_eq!(err.error, SandboxError::Name("y".to_string()));
        assert_eq!(err.to_string(), "step 2: NameError: name 'y' is not defined");
    }

    #[test]
    fn test_batches_do_not_share_bindings() {
        execute_steps(&[planned("x = sp.symbols('x')")]).unwrap();
        let err = execute_steps(&[planned("print(x)")]).unwrap_err();
        assert_eq!(err.error, SandboxError::Name("x".to_string()));
    }

    #[test]
    fn test_planned_status_is_kept() {
        let step = PlannedStep {
            content: "edit".to_string(),
            code: "print(1)".to_string(),
            status: StepStatus::Valid,
        };
        let verified = execute_steps(&[step]).unwrap();
        assert_eq!(verified[0].status, StepStatus::Valid);
        assert_eq!(verified[0].output, "1");
    }
}
