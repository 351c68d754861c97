//! Update Step Integration Tests
//!
//! Step edits through the chain assembler and the repair loop:
//! - Accepted edits continue the derivation from the edited step
//! - Off-goal edits come back as a single error step
//! - Steps before the edit are never changed
//! - Out-of-range edit indices are rejected before any generation

use proof_cascade::{AppError, UpdateStepRequest};
use proof_cascade_core::{ProofStep, StepStatus};
use proof_cascade_llm::MessageRole;

use crate::support::{plan, service_with, ScriptedProvider};

fn integral_chain() -> Vec<ProofStep> {
    vec![
        ProofStep {
            index: 1,
            content: "We want $$\\int x^2 \\, dx$$".to_string(),
            code: "x = sp.symbols('x')\nprint(sp.latex(sp.Integral(x**2, x)))".to_string(),
            output: "\\int x^{2}\\, dx".to_string(),
            status: StepStatus::Normal,
        },
        ProofStep {
            index: 2,
            content: "By the power rule $$\\int x^2 \\, dx = \\frac{x^3}{3}$$".to_string(),
            code: "print(sp.latex(sp.integrate(x**2, x)))".to_string(),
            output: "\\frac{x^{3}}{3}".to_string(),
            status: StepStatus::Normal,
        },
        ProofStep {
            index: 3,
            content: "Add the constant of integration.".to_string(),
            code: "C = sp.symbols('C')\nprint(sp.latex(x**3/3 + C))".to_string(),
            output: "C + \\frac{x^{3}}{3}".to_string(),
            status: StepStatus::Normal,
        },
    ]
}

fn request(edit_index: u32, new_content: &str) -> UpdateStepRequest {
    UpdateStepRequest {
        current_steps: integral_chain(),
        edit_index,
        new_content: new_content.to_string(),
        problem: "compute the integral of x^2".to_string(),
    }
}

#[tokio::test]
async fn test_goal_deviation_is_rejected() {
    let provider = ScriptedProvider::new(vec![plan(&[(
        "Taking the derivative no longer answers the question: we were asked for the integral of $x^2$.",
        "x = sp.symbols('x')\nprint(sp.latex(sp.Integral(x**2, x)))",
        "error",
    )])]);
    let service = service_with(provider, 3);

    let chain = service
        .update_step(&request(2, "now take the derivative instead"))
        .await
        .unwrap();

    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0], integral_chain()[0]);
    assert_eq!(chain[1].index, 2);
    assert_eq!(chain[1].status, StepStatus::Error);
    assert!(chain[1].content.starts_with("Taking the derivative"));
    assert_eq!(chain[1].output, "\\int x^{2}\\, dx");
}

#[tokio::test]
async fn test_accepted_edit_continues_the_derivation() {
    let provider = ScriptedProvider::new(vec![plan(&[
        (
            "Write $x^2 = x \\cdot x$ and integrate term by term.",
            "x = sp.symbols('x')\nF = sp.integrate(x*x, x)\nprint(sp.latex(F))",
            "valid",
        ),
        (
            "Check by differentiating.",
            "print(sp.latex(sp.diff(F, x)))",
            "normal",
        ),
    ])]);
    let service = service_with(provider, 3);

    let chain = service
        .update_step(&request(2, "Write x^2 as x times x"))
        .await
        .unwrap();

    assert_eq!(chain.len(), 3);
    let indices: Vec<u32> = chain.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(chain[1].status, StepStatus::Valid);
    assert_eq!(chain[1].output, "\\frac{x^{3}}{3}");
    assert_eq!(chain[2].output, "x^{2}");
}

#[tokio::test]
async fn test_prefix_is_immutable() {
    // The prefix carries values no sandbox run would produce; they must come
    // back exactly as sent.
    let mut steps = integral_chain();
    steps[0].output = "hand-edited".to_string();
    steps[1].status = StepStatus::Valid;

    let provider = ScriptedProvider::new(vec![plan(&[(
        "Finish.",
        "print(1)",
        "valid",
    )])]);
    let service = service_with(provider, 3);

    let chain = service
        .update_step(&UpdateStepRequest {
            current_steps: steps.clone(),
            edit_index: 3,
            new_content: "Finish.".to_string(),
            problem: "compute the integral of x^2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(&chain[..2], &steps[..2]);
    assert_eq!(chain[2].index, 3);
}

#[tokio::test]
async fn test_edit_conversation_content() {
    let provider = ScriptedProvider::new(vec![plan(&[("ok", "print(1)", "valid")])]);
    let service = service_with(provider.clone(), 3);

    service
        .update_step(&request(3, "Skip the constant."))
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let messages = &calls[0].messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::User);
    let prompt = &messages[0].content;
    assert!(prompt.contains("compute the integral of x^2"));
    assert!(prompt.contains("print(sp.latex(sp.integrate(x**2, x)))"));
    assert!(!prompt.contains("C = sp.symbols('C')"));
    assert!(prompt.contains("\"Skip the constant.\""));
}

#[tokio::test]
async fn test_exhaustion_during_edit() {
    let provider = ScriptedProvider::always(plan(&[("broken", "print(undefined_name)", "valid")]));
    let service = service_with(provider.clone(), 3);

    let chain = service.update_step(&request(2, "something")).await.unwrap();
    assert_eq!(provider.call_count(), 3);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0], integral_chain()[0]);
    assert_eq!(chain[1].index, 2);
    assert!(chain[1].is_error());
}

#[tokio::test]
async fn test_edit_index_out_of_range() {
    let provider = ScriptedProvider::new(vec![]);
    let service = service_with(provider.clone(), 3);

    for edit_index in [0, 4] {
        let err = service
            .update_step(&request(edit_index, "anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
    assert_eq!(provider.call_count(), 0);
}
