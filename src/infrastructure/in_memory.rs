use crate::domain::account::Account;
use crate::domain::credit::{Credit, ScheduledPayment};
use crate::domain::ids::{AccountId, CreditId, PaymentId, TransactionId, UserId};
use crate::domain::ports::{AtomicUnit, Expected, LedgerStore, RowWrite, Versioned};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Versioned<Account>>,
    transactions: HashMap<TransactionId, Transaction>,
    credits: HashMap<CreditId, Versioned<Credit>>,
    payments: HashMap<PaymentId, Versioned<ScheduledPayment>>,
}

/// A thread-safe in-memory ledger store.
///
/// All tables sit behind one `RwLock`, so a commit validates and applies its
/// whole unit while no reader can observe a partial write. Ideal for testing or
/// single-process deployments where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn check<K, T>(table: &HashMap<K, Versioned<T>>, key: &K, expected: Expected, what: &str) -> Result<()>
where
    K: Hash + Eq + Display,
{
    let current = table.get(key).map(|row| row.version);
    if expected.admits(current) {
        Ok(())
    } else {
        Err(LedgerError::conflict(format!(
            "{what} {key}: expected {expected:?}, found version {current:?}"
        )))
    }
}

fn apply<K, T>(table: &mut HashMap<K, Versioned<T>>, key: K, write: RowWrite<T>)
where
    K: Hash + Eq,
{
    let version = write.expected.next_version();
    table.insert(key, Versioned::new(write.row, version));
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|row| row.value.user_id == user_id)
            .map(|row| row.value.clone())
            .collect())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.values().map(|row| row.value.clone()).collect())
    }

    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn credit(&self, id: CreditId) -> Result<Option<Versioned<Credit>>> {
        let tables = self.tables.read().await;
        Ok(tables.credits.get(&id).cloned())
    }

    async fn credits_by_user(&self, user_id: UserId) -> Result<Vec<Credit>> {
        let tables = self.tables.read().await;
        Ok(tables
            .credits
            .values()
            .filter(|row| row.value.user_id == user_id)
            .map(|row| row.value.clone())
            .collect())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Versioned<ScheduledPayment>>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn payments_by_credit(&self, credit_id: CreditId) -> Result<Vec<ScheduledPayment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|row| row.value.credit_id == credit_id)
            .map(|row| row.value.clone())
            .collect())
    }

    async fn pending_payments_due(&self, as_of: DateTime<Utc>) -> Result<Vec<ScheduledPayment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|row| row.value.is_due(as_of))
            .map(|row| row.value.clone())
            .collect())
    }

    async fn commit(&self, unit: AtomicUnit) -> Result<()> {
        if unit.is_empty() {
            return Ok(());
        }
        let mut tables = self.tables.write().await;

        // Validate everything before touching any table.
        for w in &unit.accounts {
            check(&tables.accounts, &w.row.id, w.expected, "account")?;
        }
        for w in &unit.credits {
            check(&tables.credits, &w.row.id, w.expected, "credit")?;
        }
        for w in &unit.payments {
            check(&tables.payments, &w.row.id, w.expected, "payment")?;
        }
        for tx in &unit.transactions {
            if tables.transactions.contains_key(&tx.id) {
                return Err(LedgerError::conflict(format!("transaction {} already recorded", tx.id)));
            }
        }

        for w in unit.accounts {
            apply(&mut tables.accounts, w.row.id, w);
        }
        for w in unit.credits {
            apply(&mut tables.credits, w.row.id, w);
        }
        for w in unit.payments {
            apply(&mut tables.payments, w.row.id, w);
        }
        for tx in unit.transactions {
            tables.transactions.insert(tx.id, tx);
        }
        Ok(())
    }
}
