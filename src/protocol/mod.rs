//! Command protocol
//!
//! Handles command parsing, dispatch and reply formatting.

pub mod commands;
pub mod handlers;
pub mod responses;

pub use commands::{Command, CommandResult, CommandStatus, parse_command};
pub use handlers::{error_result, handle_command};
