//! PostgreSQL-backed repositories

pub mod credential;
pub mod revocation;

pub use credential::{CredentialRepository, PgCredentialRepository};
pub use revocation::PgRevocationStore;
