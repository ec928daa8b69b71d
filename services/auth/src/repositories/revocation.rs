//! Revocation store backed by the `revoked_tokens` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::debug;

use crate::revocation::RevocationStore;

/// Revocation store backed by PostgreSQL.
///
/// Inserts are single-row with `ON CONFLICT DO NOTHING`; pruning is one
/// `DELETE` by predicate. Concurrency control is left to the database.
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn record(&self, token_key: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token_key)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        if result.rows_affected() == 0 {
            debug!("Token already revoked");
        }

        Ok(())
    }

    async fn is_revoked(&self, token_key: &str) -> DatabaseResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token = $1)")
                .bind(token_key)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;

        Ok(revoked)
    }

    async fn prune(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> DatabaseResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revoked_tokens")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(count as u64)
    }
}
