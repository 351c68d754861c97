//! Proof Cascade Core
//!
//! Foundational data model and error types for the Proof Cascade workspace.
//! This crate has no dependencies on the generator, the sandbox or the
//! transport layer.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `proof` - The proof chain model (`ProofStep`, `StepStatus`) and sentinel markers
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/thiserror** - keeps build times minimal
//! 2. **Plain data** - every type here is serializable and owned by the caller
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod proof;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Proof Chain Model ──────────────────────────────────────────────────
pub use proof::{
    normalize_output, ProofStep, StepStatus, NO_OUTPUT_MARKER, TERMINAL_ERROR_CODE,
    TERMINAL_ERROR_CONTENT, TERMINAL_ERROR_OUTPUT,
};
