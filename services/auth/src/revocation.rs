//! Server-side token revocation ("blacklist")
//!
//! A logged-out token stays cryptographically valid until it expires, so
//! every authenticated request also checks this store. Entries carry the
//! token's own expiry and become prunable once it passes, since the JWT
//! service rejects an expired token regardless of revocation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Revocation store and reaper configuration
#[derive(Debug, Clone)]
pub struct RevocationConfig {
    /// Deadline for a single `record` or `is_revoked` call
    pub lookup_timeout: Duration,
    /// Sleep between reaper passes
    pub reaper_interval: Duration,
    /// Deadline for a single prune; must be shorter than the interval
    pub prune_timeout: Duration,
}

impl RevocationConfig {
    /// Create a new RevocationConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REVOCATION_LOOKUP_TIMEOUT`: Store call timeout in seconds (default: 5)
    /// - `REVOCATION_REAPER_INTERVAL`: Reaper interval in seconds (default: 86400)
    /// - `REVOCATION_PRUNE_TIMEOUT`: Prune timeout in seconds (default: 60)
    pub fn from_env() -> Result<Self> {
        let lookup_timeout = seconds_from_env("REVOCATION_LOOKUP_TIMEOUT", 5)?;
        let reaper_interval = seconds_from_env("REVOCATION_REAPER_INTERVAL", 86_400)?;
        let prune_timeout = seconds_from_env("REVOCATION_PRUNE_TIMEOUT", 60)?;

        let config = RevocationConfig {
            lookup_timeout,
            reaper_interval,
            prune_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup_timeout.is_zero() {
            anyhow::bail!("REVOCATION_LOOKUP_TIMEOUT must be greater than zero");
        }
        if self.prune_timeout.is_zero() || self.prune_timeout >= self.reaper_interval {
            anyhow::bail!(
                "REVOCATION_PRUNE_TIMEOUT ({:?}) must be non-zero and shorter than REVOCATION_REAPER_INTERVAL ({:?})",
                self.prune_timeout,
                self.reaper_interval
            );
        }
        Ok(())
    }
}

/// Unset falls back to `default`; a value that does not parse is an error.
fn seconds_from_env(name: &str, default: u64) -> Result<Duration> {
    let secs = match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got {:?}", name, value))?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}

/// Revocation key for a raw token: lowercase hex SHA-256 of the exact string.
///
/// Keeps the column fixed-length and keeps bearer tokens out of the table.
pub fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Durable revoked-token-key → expiry mapping
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revoked token. Recording the same key twice is a no-op.
    async fn record(&self, token_key: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()>;

    /// Whether the key has been revoked
    async fn is_revoked(&self, token_key: &str) -> DatabaseResult<bool>;

    /// Delete every entry with `expires_at <= now`, returning how many went
    async fn prune(&self, now: DateTime<Utc>) -> DatabaseResult<u64>;

    /// Number of entries currently held
    async fn count(&self) -> DatabaseResult<u64>;
}

/// In-process revocation store for tests and single-node development
#[derive(Debug, Clone, Default)]
pub struct MemoryRevocationStore {
    entries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn record(&self, token_key: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        self.entries
            .write()
            .await
            .entry(token_key.to_string())
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, token_key: &str) -> DatabaseResult<bool> {
        Ok(self.entries.read().await.contains_key(token_key))
    }

    async fn prune(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - entries.len()) as u64)
    }

    async fn count(&self) -> DatabaseResult<u64> {
        Ok(self.entries.read().await.len() as u64)
    }
}

/// Bounds every call on the wrapped store with a deadline.
///
/// A call that misses its deadline fails with [`DatabaseError::Timeout`];
/// on the request path that rejects the request.
#[derive(Clone)]
pub struct TimedRevocationStore {
    inner: Arc<dyn RevocationStore>,
    timeout: Duration,
}

impl TimedRevocationStore {
    pub fn new(inner: Arc<dyn RevocationStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: F) -> DatabaseResult<T>
    where
        F: std::future::Future<Output = DatabaseResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| DatabaseError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl RevocationStore for TimedRevocationStore {
    async fn record(&self, token_key: &str, expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        self.bounded(self.inner.record(token_key, expires_at)).await
    }

    async fn is_revoked(&self, token_key: &str) -> DatabaseResult<bool> {
        self.bounded(self.inner.is_revoked(token_key)).await
    }

    async fn prune(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        self.bounded(self.inner.prune(now)).await
    }

    async fn count(&self) -> DatabaseResult<u64> {
        self.bounded(self.inner.count()).await
    }
}
