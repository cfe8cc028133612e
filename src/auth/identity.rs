//! Caller identity
//!
//! The storage core never looks up "who is calling" on its own. Every
//! operation receives a [`Caller`] and resolves the bucket from it.

use crate::error::StorageError;

/// Principal name some identity providers report for unauthenticated callers
const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    username: String,
    user_id: u64,
}

impl Principal {
    pub fn new(username: impl Into<String>, user_id: u64) -> Self {
        Self {
            username: username.into(),
            user_id,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Name of the bucket that belongs to this principal
    pub fn bucket_name(&self) -> String {
        bucket_name_for(&self.username, self.user_id)
    }
}

/// Identity of whoever issued a storage request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    principal: Option<Principal>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// Returns the active principal, or `Unauthenticated` when there is none.
    pub fn principal(&self) -> Result<&Principal, StorageError> {
        match &self.principal {
            Some(p) if p.username() != ANONYMOUS_PRINCIPAL => Ok(p),
            _ => Err(StorageError::Unauthenticated),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal().is_ok()
    }
}

/// Prefix used when nothing of the username survives sanitizing
const FALLBACK_BUCKET_PREFIX: &str = "user";

/// Derives a bucket name from a username and user id.
///
/// Lowercases the name, replaces every non-alphanumeric character with `-`
/// and appends the numeric id so that distinct users never collide. Runs of
/// `-` are collapsed and trimmed from both ends, which keeps the result a
/// legal S3 bucket name; a username with no ASCII alphanumerics maps to
/// `user-<id>`.
pub fn bucket_name_for(username: &str, user_id: u64) -> String {
    let mut sanitized = String::with_capacity(username.len());
    for c in username.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let sanitized = sanitized.trim_end_matches('-');

    if sanitized.is_empty() {
        format!("{}-{}", FALLBACK_BUCKET_PREFIX, user_id)
    } else {
        format!("{}-{}", sanitized, user_id)
    }
}
