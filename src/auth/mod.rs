//! Identity collaborator
//!
//! Account validation, caller identity and bucket-name derivation.

pub mod identity;
pub mod validator;

pub use identity::{Caller, Principal, bucket_name_for};
pub use validator::Accounts;
