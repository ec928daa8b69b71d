//! Credential record and login payload

use serde::Deserialize;
use sqlx::FromRow;

/// The slice of a user or vendor row needed to check a password.
///
/// Owned by the user/vendor entities; read-only here.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRecord {
    pub id: i64,
    pub password_hash: String,
}

/// User or vendor login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
