//! HTTP Commands
//!
//! Request handlers behind the HTTP routes. They stay thin: decode, call the
//! service, encode.

pub mod health;
pub mod proof;

pub use health::*;
pub use proof::*;
