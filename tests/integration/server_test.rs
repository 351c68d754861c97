//! Server Integration Tests
//!
//! Command handlers called directly with axum extractors, plus router and
//! state construction. No sockets are opened.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use proof_cascade::commands::{get_health, solve, update_step};
use proof_cascade::{server, AppConfig, AppState, SolveRequest, UpdateStepRequest};
use proof_cascade_core::StepStatus;

use crate::support::{derivative_plan, ScriptedProvider};

fn state_with(provider: Arc<ScriptedProvider>) -> Arc<AppState> {
    Arc::new(AppState::with_provider(AppConfig::default(), provider))
}

#[tokio::test]
async fn test_solve_handler() {
    let state = state_with(ScriptedProvider::new(vec![derivative_plan()]));

    let Json(body) = solve(
        State(state),
        Json(SolveRequest {
            problem: "differentiate f(x) = x^2".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(body.steps.len(), 2);
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["steps"][1]["output"], "2 x");
    assert_eq!(json["steps"][1]["status"], "normal");
}

#[tokio::test]
async fn test_update_step_handler_rejects_bad_index() {
    let state = state_with(ScriptedProvider::new(vec![]));

    let err = update_step(
        State(state),
        Json(UpdateStepRequest {
            current_steps: vec![],
            edit_index: 1,
            new_content: "x".to_string(),
            problem: "p".to_string(),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_step_handler() {
    let state = state_with(ScriptedProvider::new(vec![derivative_plan()]));
    let Json(first) = solve(
        State(state.clone()),
        Json(SolveRequest {
            problem: "differentiate f(x) = x^2".to_string(),
        }),
    )
    .await
    .unwrap();

    let state = state_with(ScriptedProvider::new(vec![crate::support::plan(&[(
        "Differentiating instead gives nothing new here.",
        "print(0)",
        "error",
    )])]));
    let Json(second) = update_step(
        State(state),
        Json(UpdateStepRequest {
            current_steps: first.steps.clone(),
            edit_index: 2,
            new_content: "integrate instead".to_string(),
            problem: "differentiate f(x) = x^2".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(second.steps.len(), 2);
    assert_eq!(second.steps[0], first.steps[0]);
    assert_eq!(second.steps[1].status, StepStatus::Error);
}

#[tokio::test]
async fn test_health_handler() {
    let state = state_with(ScriptedProvider::new(vec![]));
    let Json(health) = get_health(State(state)).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.provider, "scripted");
    assert_eq!(health.model, "scripted-model");
}

#[test]
fn test_router_builds_with_and_without_cors() {
    let _ = server::router(state_with(ScriptedProvider::new(vec![])));

    let mut config = AppConfig::default();
    config.server.cors_allow_any = false;
    let state = Arc::new(AppState::with_provider(config, ScriptedProvider::new(vec![])));
    let _ = server::router(state);
}

#[test]
fn test_state_from_config_validates() {
    let mut config = AppConfig::default();
    config.generation.max_retries = 0;
    assert!(AppState::from_config(config).is_err());

    assert!(AppState::from_config(AppConfig::default()).is_ok());
}
