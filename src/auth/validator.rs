//! Account validator
//!
//! Implements username and password validation against the account table of
//! the identity collaborator.

use std::collections::HashMap;

use super::identity::Principal;
use crate::config::AccountConfig;
use crate::error::AuthError;

const MAX_USERNAME_LENGTH: usize = 64;

/// Performs basic input sanitation to check for malicious or malformed input.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

struct Account {
    password: String,
    id: u64,
}

/// Accounts the server accepts
pub struct Accounts {
    accounts: HashMap<String, Account>,
}

impl Accounts {
    pub fn new(configured: &[AccountConfig]) -> Self {
        let accounts = configured
            .iter()
            .map(|a| {
                (
                    a.username.clone(),
                    Account {
                        password: a.password.clone(),
                        id: a.id,
                    },
                )
            })
            .collect();
        Self { accounts }
    }

    /// Validates that the given username exists.
    pub fn validate_user(&self, username: &str) -> Result<(), AuthError> {
        if !is_valid_input(username, MAX_USERNAME_LENGTH) || username.contains(['/', '\\']) {
            return Err(AuthError::InvalidUsername(username.to_string()));
        }

        if self.accounts.contains_key(username) {
            Ok(())
        } else {
            Err(AuthError::UserNotFound(username.to_string()))
        }
    }

    /// Validates the password and returns the authenticated principal.
    pub fn validate_password(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        match self.accounts.get(username) {
            Some(account) if account.password == password => {
                Ok(Principal::new(username, account.id))
            }
            Some(_) => Err(AuthError::InvalidPassword(username.to_string())),
            None => Err(AuthError::UserNotFound(username.to_string())),
        }
    }

    /// Principals of every configured account
    pub fn principals(&self) -> impl Iterator<Item = Principal> + '_ {
        self.accounts
            .iter()
            .map(|(name, account)| Principal::new(name.clone(), account.id))
    }
}
