//! Business Logic Services
//!
//! Contains the core business logic for the application.

pub mod proof;
