//! Proof Commands
//!
//! Handlers for the two proof operations. Both always answer with a chain;
//! only malformed requests produce an error response.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::proof::{SolveRequest, StepsResponse, UpdateStepRequest};
use crate::state::AppState;
use crate::utils::error::AppResult;

/// `POST /api/solve`
pub async fn solve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SolveRequest>,
) -> AppResult<Json<StepsResponse>> {
    let steps = state.proof().solve(&request.problem).await?;
    Ok(Json(steps.into()))
}

/// `POST /api/update_step`
pub async fn update_step(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateStepRequest>,
) -> AppResult<Json<StepsResponse>> {
    let steps = state.proof().update_step(&request).await?;
    Ok(Json(steps.into()))
}
