//! Proof Cascade
//!
//! Generates step-by-step mathematical derivations whose every step is
//! checked by running a verification fragment in a local symbolic sandbox,
//! and regenerates the rest of a derivation after a user edits one step.
//! It includes:
//! - The generate-verify-repair services
//! - HTTP command handlers and the server
//! - Configuration and data models

pub mod commands;
pub mod models;
pub mod server;
pub mod services;
pub mod state;
pub mod utils;

pub use models::proof::{SolveRequest, StepsResponse, UpdateStepRequest};
pub use models::response::HealthResponse;
pub use models::settings::{AppConfig, ConfigOverrides};
pub use services::proof::ProofService;
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
