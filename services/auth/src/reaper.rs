//! Background pruning of expired revocation entries

use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::revocation::{RevocationConfig, RevocationStore};

/// Periodically deletes revocation entries whose token has expired.
///
/// Runs as one sleep-then-prune loop, so passes can never overlap. A failed
/// pass is logged and the loop carries on; skipping a pass only delays the
/// removal of rows that no longer protect anything.
pub struct RevocationReaper {
    store: Arc<dyn RevocationStore>,
    interval: Duration,
    prune_timeout: Duration,
}

impl RevocationReaper {
    pub fn new(store: Arc<dyn RevocationStore>, config: &RevocationConfig) -> Self {
        Self {
            store,
            interval: config.reaper_interval,
            prune_timeout: config.prune_timeout,
        }
    }

    /// Run one prune pass bounded by the prune timeout
    pub async fn run_once(&self) -> DatabaseResult<u64> {
        tokio::time::timeout(self.prune_timeout, self.store.prune(Utc::now()))
            .await
            .map_err(|_| DatabaseError::Timeout(self.prune_timeout))?
    }

    /// Entries still held, bounded by the prune timeout
    pub async fn remaining(&self) -> DatabaseResult<u64> {
        tokio::time::timeout(self.prune_timeout, self.store.count())
            .await
            .map_err(|_| DatabaseError::Timeout(self.prune_timeout))?
    }

    /// Start the reaper loop. Called once, at process boot.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Starting revocation reaper with interval {:?}",
            self.interval
        );

        tokio::spawn(async move {
            loop {
                sleep(self.interval).await;

                let pruned = match self.run_once().await {
                    Ok(pruned) => pruned,
                    Err(e) => {
                        error!(error = %e, "Failed to prune revocation entries");
                        continue;
                    }
                };

                match self.remaining().await {
                    Ok(remaining) => {
                        info!(pruned, remaining, "Pruned expired revocation entries")
                    }
                    Err(e) => {
                        info!(pruned, "Pruned expired revocation entries");
                        error!(error = %e, "Failed to count revocation entries");
                    }
                }
            }
        })
    }
}
