//! Health Check Commands
//!
//! Reports that the service is up and which generator it talks to.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::response::HealthResponse;
use crate::state::AppState;

/// `GET /api/health`
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let provider = state.proof().provider();
    Json(HealthResponse::new(provider.name(), provider.model()))
}
