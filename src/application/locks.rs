//! In-process row locks.
//!
//! Every read-modify-write operation locks the rows it touches before reading
//! them. Keys are always acquired in ascending [`RowKey`] order, so two
//! operations that share rows (e.g. transfers in opposite directions) can never
//! wait on each other in a cycle.

use crate::domain::ids::{AccountId, CreditId, PaymentId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Global lock order: accounts, then credits, then payments, each by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Account(AccountId),
    Credit(CreditId),
    Payment(PaymentId),
}

type LockTable = HashMap<RowKey, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default, Clone)]
pub struct RowLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Holds a set of row locks; dropping it releases them.
#[derive(Debug)]
pub struct RowGuard {
    locks: RowLocks,
    held: Vec<OwnedMutexGuard<()>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every key, in global order, waiting for current holders.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = RowKey>) -> RowGuard {
        let mut keys: Vec<RowKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        // Owned by the guard from the start so a cancelled wait still releases
        // and prunes whatever was already taken.
        let mut guard = RowGuard {
            locks: self.clone(),
            held: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let mutex = self.entry(key);
            guard.held.push(mutex.lock_owned().await);
        }
        guard
    }

    fn entry(&self, key: RowKey) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entry(key).or_default().clone()
    }

    /// Number of rows with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        self.held.clear();

        // Forget entries nobody else is holding or waiting on, including ones
        // left behind by an acquisition that was cancelled mid-wait.
        let mut table = self.locks.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}
