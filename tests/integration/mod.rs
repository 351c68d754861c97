//! Integration Tests Module
//!
//! End-to-end tests of the generate-verify-repair loop with a scripted
//! generator standing in for the text-generation service. The real sandbox
//! verifies every plan.

// Scripted provider and plan builders
mod support;

// Fresh derivations, repair feedback and the retry bound
mod solve_test;

// Step edits and chain assembly
mod update_step_test;

// HTTP command handlers and state
mod server_test;
