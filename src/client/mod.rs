//! Client management
//!
//! Handles per-connection state and the session command loop.

pub mod handler;
pub mod session;
pub mod state;

pub use handler::{handle_client, serve};
pub use session::SessionContext;
pub use state::Client;
