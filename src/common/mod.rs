//! Shared types, errors and collaborator traits

pub mod channels;
pub mod errors;
pub mod serde_helpers;
pub mod traits;
pub mod types;
