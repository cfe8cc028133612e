//! Server core functionality
//!
//! Accept loop and connection limit of the storage server.

pub mod core;

pub use core::Server;
