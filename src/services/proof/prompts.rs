//! Prompt Text
//!
//! Instructions sent to the text-generation service. The system instructions
//! describe the plan format and the rules for verification fragments; the
//! user turns carry the problem or the edit.

use proof_cascade_core::ProofStep;

/// System instructions for every plan request.
pub const SYSTEM_PROMPT: &str = r#"You are a mathematical problem-solving assistant.
Produce a derivation that reads like a textbook: split the solution into small,
rigorous logical steps. Do not restate the problem.

## Output Format
Return exactly one JSON object and nothing else:
{
  "steps": [
    {
      "content": "Explanation of this step. Weave formulas into the prose: inline math in $...$, display math in $$...$$. Example: 'Differentiating $f(x)$ gives $$ f'(x) = 2x $$'",
      "code": "SymPy code that verifies this step. It must print sympy.latex(result).",
      "status": "normal"
    }
  ]
}

## Verification Code Rules
1. The code must run. `sympy` and `sp` are already imported. Every step runs
   in the same namespace, so names defined by earlier steps stay available.
2. Use straight-line statements only: assignments, calls and print. Do not
   write loops, conditionals or function definitions.
3. Print the LaTeX string and nothing else.
   - Never add labels such as 'Result:' to the printed text.
   - Wrong: print(f'Result: {sympy.latex(res)}')
   - Right: print(sympy.latex(res))
   - Print several results on separate lines."#;

/// User turn that starts a fresh derivation.
pub fn solve_prompt(problem: &str) -> String {
    format!("Solve this problem completely: {}", problem.trim())
}

/// User turn for an edit at `edit_index` (1-based). `prefix` holds the
/// confirmed steps before the edited one; only their code is quoted.
pub fn update_prompt(problem: &str, prefix: &[ProofStep], edit_index: u32, new_content: &str) -> String {
    let confirmed_code = if prefix.is_empty() {
        "(none)".to_string()
    } else {
        prefix
            .iter()
            .map(|step| step.code.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a rigorous mathematics engine.

## Final Goal
We must solve the original problem: **"{problem}"**
Keep this goal in mind at all times and do not drift away from it.

## Progress So Far
The first {confirmed} step(s) are established (their code has already run):
{confirmed_code}

## User Edit
The user changed step {edit_index} to:
"{new_content}"

## Task
1. Consistency check: is the edit mathematically sound, and does it follow from the previous steps?
2. Goal check: does the edit still help solve the Final Goal?
   - If the user turned "compute the integral" into "take the derivative", the edit leaves the goal and must be marked error.
3. Write for the user: state plainly whether the edit is right or wrong, in a teaching tone. Do not describe what you checked or how.

## Case A: the edit is valid and moves toward the goal
- Rewrite the edited step with status "valid".
- Continue generating the following steps until the Final Goal is fully solved.

## Case B: the edit is invalid or leaves the goal
- Output only this one step, with status "error".
- Use its content to explain why (for example: "This change no longer solves the original integral...")."#,
        problem = problem.trim(),
        confirmed = prefix.len(),
        confirmed_code = confirmed_code,
        edit_index = edit_index,
        new_content = new_content.trim(),
    )
}

/// Diagnostic turn appended after a verification failure.
pub fn diagnostic(error: &str) -> String {
    format!("Code Error: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proof_cascade_core::StepStatus;

    fn step(index: u32, code: &str) -> ProofStep {
        ProofStep {
            index,
            content: format!("step {}", index),
            code: code.to_string(),
            output: "x".to_string(),
            status: StepStatus::Normal,
        }
    }

    #[test]
    fn test_solve_prompt_embeds_problem() {
        assert_eq!(
            solve_prompt("  differentiate x^2 "),
            "Solve this problem completely: differentiate x^2"
        );
    }

    #[test]
    fn test_update_prompt_lists_confirmed_code() {
        let prefix = vec![
            step(1, "x = sp.symbols('x')"),
            step(2, "F = sp.integrate(x**2, x)"),
        ];
        let prompt = update_prompt("compute the integral of x^2", &prefix, 3, "now take the derivative instead");
        assert!(prompt.contains("**\"compute the integral of x^2\"**"));
        assert!(prompt.contains("The first 2 step(s) are established"));
        assert!(prompt.contains("x = sp.symbols('x')\nF = sp.integrate(x**2, x)"));
        assert!(prompt.contains("The user changed step 3 to:\n\"now take the derivative instead\""));
        assert!(prompt.contains("status \"valid\""));
        assert!(prompt.contains("status \"error\""));
    }

    #[test]
    fn test_update_prompt_without_prefix() {
        let prompt = update_prompt("p", &[], 1, "start over");
        assert!(prompt.contains("The first 0 step(s) are established (their code has already run):\n(none)"));
    }

    #[test]
    fn test_diagnostic() {
        assert_eq!(
            diagnostic("step 2: NameError: name 'y' is not defined"),
            "Code Error: step 2: NameError: name 'y' is not defined"
        );
    }
}
