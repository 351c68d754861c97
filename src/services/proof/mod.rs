//! Proof Service
//!
//! The generate-verify-repair loop:
//! - Plan requests to the text-generation service
//! - Plan parsing into candidate steps
//! - Step execution against the verification sandbox
//! - Bounded retry with diagnostic feedback
//! - Chain assembly for step edits

pub mod controller;
pub mod conversation;
pub mod editor;
pub mod executor;
pub mod parser;
pub mod prompts;
pub mod requester;
pub mod service;

pub use controller::{AttemptOutcome, RepairController};
pub use conversation::Conversation;
pub use executor::{execute_steps, VerificationError};
pub use parser::{parse_plan, PlanFormatError, PlannedStep};
pub use requester::{PlanRequester, ServiceError};
pub use service::ProofService;
