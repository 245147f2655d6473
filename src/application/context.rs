use super::locks::RowLocks;
use crate::config::EngineConfig;
use crate::domain::ports::{SharedClock, SharedLedgerStore, SharedNotifier};
use crate::error::{LedgerError, Result};
use std::future::Future;
use tracing::warn;

/// Collaborators shared by every engine component.
pub struct LedgerContext {
    pub store: SharedLedgerStore,
    pub locks: RowLocks,
    pub clock: SharedClock,
    pub notifier: SharedNotifier,
    pub config: EngineConfig,
}

impl LedgerContext {
    pub fn new(
        store: SharedLedgerStore,
        notifier: SharedNotifier,
        clock: SharedClock,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            locks: RowLocks::new(),
            clock,
            notifier,
            config,
        }
    }

    /// Runs one attempt of an operation, re-running it from scratch whenever the
    /// store rejects its commit as conflicting.
    ///
    /// Conflicts never reach the caller as such: once `max_retries` re-runs have
    /// also conflicted, the operation fails with `Contention`.
    pub async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match attempt().await {
                Err(LedgerError::ConcurrencyConflict(detail)) => {
                    if attempts > self.config.max_retries {
                        warn!(operation, attempts, %detail, "giving up after repeated commit conflicts");
                        return Err(LedgerError::Contention {
                            operation,
                            attempts,
                        });
                    }
                    warn!(operation, attempt = attempts, %detail, "commit conflict, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempts).await;
                }
                other => return other,
            }
        }
    }
}
