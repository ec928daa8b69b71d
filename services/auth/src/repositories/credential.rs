//! Credential lookups and password updates for users and vendors

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::debug;

use crate::models::{CredentialRecord, Role};

/// Access to the password hash stored on user and vendor rows
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Find a principal's credentials by login e-mail
    async fn find_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> DatabaseResult<Option<CredentialRecord>>;

    /// Find a principal's credentials by row id
    async fn find_by_id(&self, role: Role, id: i64) -> DatabaseResult<Option<CredentialRecord>>;

    /// Replace a principal's password hash
    async fn update_password_hash(
        &self,
        role: Role,
        id: i64,
        password_hash: &str,
    ) -> DatabaseResult<()>;
}

/// Credential repository over the `users` and `vendors` tables.
///
/// Table names come from the closed [`Role`] enum, never from input.
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    /// Create a new credential repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn find_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> DatabaseResult<Option<CredentialRecord>> {
        debug!("Finding {} credentials by email", role);

        let sql = format!(
            "SELECT id, password AS password_hash FROM {} WHERE email = $1",
            role.credential_table()
        );

        sqlx::query_as::<_, CredentialRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)
    }

    async fn find_by_id(&self, role: Role, id: i64) -> DatabaseResult<Option<CredentialRecord>> {
        debug!("Finding {} credentials by ID: {}", role, id);

        let sql = format!(
            "SELECT id, password AS password_hash FROM {} WHERE id = $1",
            role.credential_table()
        );

        sqlx::query_as::<_, CredentialRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)
    }

    async fn update_password_hash(
        &self,
        role: Role,
        id: i64,
        password_hash: &str,
    ) -> DatabaseResult<()> {
        let sql = format!(
            "UPDATE {} SET password = $1, updated_at = NOW() WHERE id = $2",
            role.credential_table()
        );

        sqlx::query(&sql)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
