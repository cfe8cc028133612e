//! Error handling
//!
//! Defines error types and their translation to response statuses.

pub mod handlers;
pub mod types;

pub use types::*;
