//! Data Models
//!
//! Contains the data structures exchanged with the transport layer and the
//! application configuration.

pub mod proof;
pub mod response;
pub mod settings;

pub use proof::*;
pub use response::*;
pub use settings::*;
