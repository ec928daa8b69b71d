//! Authentication service models

pub mod credential;
pub mod response;
pub mod role;

// Re-export for convenience
pub use credential::{CredentialRecord, LoginRequest};
pub use response::ApiResponse;
pub use role::Role;
