//! Module `client`
//!
//! Defines the `Client` struct holding the per-connection session state:
//! the username awaiting a password and the identity storage calls run as.

use crate::auth::Caller;

/// Represents the state of a connected client.
///
/// A fresh client is anonymous; storage commands issued before login fail
/// with `Unauthenticated`.
#[derive(Debug, Default)]
pub struct Client {
    pending_user: Option<String>,
    caller: Caller,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets authentication state
    pub fn logout(&mut self) {
        self.pending_user = None;
        self.caller = Caller::anonymous();
    }

    // --------------------
    // Getter methods
    // --------------------

    /// Username accepted by USER and awaiting PASS
    pub fn pending_user(&self) -> Option<&str> {
        self.pending_user.as_deref()
    }

    /// Identity storage operations are issued with
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn is_logged_in(&self) -> bool {
        self.caller.is_authenticated()
    }

    // --------------------
    // Setter methods
    // --------------------

    pub fn set_pending_user(&mut self, username: Option<String>) {
        self.pending_user = username;
    }

    pub fn set_caller(&mut self, caller: Caller) {
        self.caller = caller;
    }
}
