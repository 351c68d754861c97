//! Solve Integration Tests
//!
//! Fresh derivations through the full generate-verify-repair loop with a
//! scripted generator:
//! - Happy path indexing and outputs
//! - Diagnostic feedback after a verification failure
//! - Recovery from malformed and failed generator responses
//! - Retry bound and the terminal error step

use proof_cascade::AppError;
use proof_cascade_core::{StepStatus, NO_OUTPUT_MARKER, TERMINAL_ERROR_CODE};
use proof_cascade_llm::{LlmError, MessageRole, ResponseFormat};

use crate::support::{derivative_plan, plan, service_with, text, Scripted, ScriptedProvider};

#[tokio::test]
async fn test_happy_path_derivative() {
    let provider = ScriptedProvider::new(vec![derivative_plan()]);
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("differentiate f(x) = x^2").await.unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].index, 1);
    assert_eq!(steps[1].index, 2);
    assert_eq!(steps[0].output, "x^{2}");
    assert_eq!(steps[1].output, "2 x");
    assert!(steps[1].code.contains("sp.diff"));
    assert!(steps.iter().all(|s| s.status == StepStatus::Normal));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_request_shape() {
    let provider = ScriptedProvider::new(vec![derivative_plan()]);
    let service = service_with(provider.clone(), 3);
    service.solve("  differentiate x^2  ").await.unwrap();

    let calls = provider.calls();
    let call = &calls[0];
    assert!(call.system.as_deref().unwrap_or_default().contains("\"steps\""));
    assert_eq!(call.messages.len(), 1);
    assert_eq!(call.messages[0].role, MessageRole::User);
    assert_eq!(
        call.messages[0].content,
        "Solve this problem completely: differentiate x^2"
    );
    assert_eq!(call.options.response_format, ResponseFormat::JsonObject);
    assert_eq!(call.options.temperature_override, Some(0.3));
}

#[tokio::test]
async fn test_every_output_is_non_empty() {
    let provider = ScriptedProvider::new(vec![plan(&[
        ("Declare the variable.", "x = sp.symbols('x')", "normal"),
        ("Show it.", "print('   ')", "normal"),
        ("Square it.", "print(sp.latex(x**2))", "normal"),
    ])]);
    let service = service_with(provider, 3);

    let steps = service.solve("square x").await.unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].output, NO_OUTPUT_MARKER);
    assert_eq!(steps[1].output, NO_OUTPUT_MARKER);
    assert!(steps.iter().all(|s| !s.output.is_empty()));
}

#[tokio::test]
async fn test_verification_failure_feeds_diagnostic_back() {
    let broken = plan(&[
        ("Let $x$ be a symbol.", "x = sp.symbols('x')", "normal"),
        ("Use $y$.", "print(sp.latex(y**2))", "normal"),
    ]);
    let broken_text = match &broken {
        Scripted::Text(t) => t.clone(),
        Scripted::Fail(_) => unreachable!(),
    };
    let provider = ScriptedProvider::new(vec![broken, derivative_plan()]);
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("differentiate x^2").await.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].output, "2 x");

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    let retry = &calls[1].messages;
    assert_eq!(retry.len(), 3);
    assert_eq!(retry[1].role, MessageRole::Assistant);
    assert_eq!(retry[1].content, broken_text);
    assert_eq!(retry[2].role, MessageRole::System);
    assert_eq!(
        retry[2].content,
        "Code Error: step 2: NameError: name 'y' is not defined"
    );
}

#[tokio::test]
async fn test_malformed_response_is_skipped() {
    let provider = ScriptedProvider::new(vec![
        text(r#"{"answer": "the derivative is 2x"}"#),
        derivative_plan(),
    ]);
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("differentiate x^2").await.unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| !s.content.contains("the derivative is 2x")));

    // no diagnostic for a plan that never parsed
    let calls = provider.calls();
    assert_eq!(calls[1].messages, calls[0].messages);
}

#[tokio::test]
async fn test_service_failure_is_retried() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Fail(LlmError::NetworkError {
            message: "connection reset".to_string(),
        }),
        text(""),
        derivative_plan(),
    ]);
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("differentiate x^2").await.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(provider.calls()[2].messages.len(), 1);
}

#[tokio::test]
async fn test_retry_bound_yields_terminal_error() {
    let provider = ScriptedProvider::always(plan(&[(
        "Divide by zero.",
        "print(1/0)",
        "normal",
    )]));
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("anything").await.unwrap();
    assert_eq!(provider.call_count(), 3);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].index, 1);
    assert_eq!(steps[0].status, StepStatus::Error);
    assert_eq!(steps[0].code, TERMINAL_ERROR_CODE);

    // each failure grows the history by two turns
    let lengths: Vec<usize> = provider.calls().iter().map(|c| c.messages.len()).collect();
    assert_eq!(lengths, vec![1, 3, 5]);
}

#[tokio::test]
async fn test_configured_retry_bound() {
    let provider = ScriptedProvider::always(text("not json at all"));
    let service = service_with(provider.clone(), 5);

    let steps = service.solve("anything").await.unwrap();
    assert_eq!(provider.call_count(), 5);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].is_error());
}

#[tokio::test]
async fn test_empty_problem_is_rejected() {
    let provider = ScriptedProvider::new(vec![]);
    let service = service_with(provider.clone(), 3);

    let err = service.solve("   ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_overflowing_range_is_a_verification_failure() {
    let provider = ScriptedProvider::always(plan(&[(
        "Enumerate everything.",
        "print(list(range(-9223372036854775808, 9223372036854775807)))",
        "normal",
    )]));
    let service = service_with(provider.clone(), 3);

    let steps = service.solve("p").await.unwrap();
    assert_eq!(provider.call_count(), 3);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].code, TERMINAL_ERROR_CODE);

    let calls = provider.calls();
    assert_eq!(
        calls[1].messages[2].content,
        "Code Error: step 1: ValueError: range is too large"
    );
}
