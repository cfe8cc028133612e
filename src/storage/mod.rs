//! Virtual filesystem
//!
//! Presents files and directories on top of a flat object key space.

pub mod archive;
pub mod classifier;
pub mod enumerator;
pub mod mover;
pub mod operations;
pub mod paths;
pub mod results;
pub mod search;

pub use operations::StorageService;
pub use paths::normalize_path;
pub use results::{Download, ResourceDescriptor, ResourceKind, UploadFile};
