//! HTTP Server
//!
//! Routes:
//! - `POST /api/solve`
//! - `POST /api/update_step`
//! - `GET /api/health`

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::commands;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

pub fn router(state: Arc<AppState>) -> Router {
    let cors_allow_any = state.config().server.cors_allow_any;
    let router = Router::new()
        .route("/api/solve", post(commands::solve))
        .route("/api/update_step", post(commands::update_step))
        .route("/api/health", get(commands::get_health))
        .with_state(state);

    if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Bind the configured address and serve until the process stops.
pub async fn serve(state: Arc<AppState>) -> AppResult<()> {
    let bind_addr = state.config().server.bind_addr.clone();
    let listener = TcpListener::bind(bind_addr.as_str()).await?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, router(state).into_make_service())
        .await
        .map_err(|e| AppError::internal(format!("server stopped: {}", e)))
}
