use crate::domain::account::Account;
use crate::domain::credit::{Credit, ScheduledPayment};
use crate::domain::ids::{AccountId, CreditId, PaymentId, UserId};
use crate::domain::ports::{AtomicUnit, Expected, LedgerStore, Versioned};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the append-only transaction log.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for credits.
pub const CF_CREDITS: &str = "credits";
/// Column Family for scheduled payments.
pub const CF_PAYMENTS: &str = "payments";

const COLUMN_FAMILIES: [&str; 4] = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_CREDITS, CF_PAYMENTS];

/// A persistent ledger store backed by RocksDB.
///
/// Each table lives in its own Column Family, keyed by the row id's 16 UUID
/// bytes, with JSON values. A commit validates row versions and writes the whole
/// unit through a single `WriteBatch`, so it lands entirely or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
    /// Serializes the validate-then-write step of commits.
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all ledger column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::storage(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: [u8; 16]) -> Result<Option<T>> {
        let handle = self.handle(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.handle(cf)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn check<T: DeserializeOwned>(
        &self,
        cf: &str,
        key: [u8; 16],
        expected: Expected,
        what: &str,
    ) -> Result<()> {
        let current = self.get_json::<Versioned<T>>(cf, key)?.map(|row| row.version);
        if expected.admits(current) {
            Ok(())
        } else {
            Err(LedgerError::conflict(format!(
                "{what} row: expected {expected:?}, found version {current:?}"
            )))
        }
    }

    fn put_versioned<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: [u8; 16],
        row: T,
        expected: Expected,
    ) -> Result<()> {
        let handle = self.handle(cf)?;
        let value = serde_json::to_vec(&Versioned::new(row, expected.next_version()))?;
        batch.put_cf(handle, key, value);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>> {
        self.get_json(CF_ACCOUNTS, id.to_bytes())
    }

    async fn accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        Ok(self
            .scan::<Versioned<Account>>(CF_ACCOUNTS)?
            .into_iter()
            .map(|row| row.value)
            .filter(|account| account.user_id == user_id)
            .collect())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        Ok(self
            .scan::<Versioned<Account>>(CF_ACCOUNTS)?
            .into_iter()
            .map(|row| row.value)
            .collect())
    }

    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        Ok(self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.account_id == account_id)
            .collect())
    }

    async fn credit(&self, id: CreditId) -> Result<Option<Versioned<Credit>>> {
        self.get_json(CF_CREDITS, id.to_bytes())
    }

    async fn credits_by_user(&self, user_id: UserId) -> Result<Vec<Credit>> {
        Ok(self
            .scan::<Versioned<Credit>>(CF_CREDITS)?
            .into_iter()
            .map(|row| row.value)
            .filter(|credit| credit.user_id == user_id)
            .collect())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Versioned<ScheduledPayment>>> {
        self.get_json(CF_PAYMENTS, id.to_bytes())
    }

    async fn payments_by_credit(&self, credit_id: CreditId) -> Result<Vec<ScheduledPayment>> {
        Ok(self
            .scan::<Versioned<ScheduledPayment>>(CF_PAYMENTS)?
            .into_iter()
            .map(|row| row.value)
            .filter(|payment| payment.credit_id == credit_id)
            .collect())
    }

    async fn pending_payments_due(&self, as_of: DateTime<Utc>) -> Result<Vec<ScheduledPayment>> {
        Ok(self
            .scan::<Versioned<ScheduledPayment>>(CF_PAYMENTS)?
            .into_iter()
            .map(|row| row.value)
            .filter(|payment| payment.is_due(as_of))
            .collect())
    }

    async fn commit(&self, unit: AtomicUnit) -> Result<()> {
        if unit.is_empty() {
            return Ok(());
        }
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| LedgerError::storage("commit lock poisoned"))?;

        for w in &unit.accounts {
            self.check::<Account>(CF_ACCOUNTS, w.row.id.to_bytes(), w.expected, "account")?;
        }
        for w in &unit.credits {
            self.check::<Credit>(CF_CREDITS, w.row.id.to_bytes(), w.expected, "credit")?;
        }
        for w in &unit.payments {
            self.check::<ScheduledPayment>(CF_PAYMENTS, w.row.id.to_bytes(), w.expected, "payment")?;
        }
        let tx_handle = self.handle(CF_TRANSACTIONS)?;
        for tx in &unit.transactions {
            if self.db.get_pinned_cf(tx_handle, tx.id.to_bytes())?.is_some() {
                return Err(LedgerError::conflict(format!(
                    "transaction {} already recorded",
                    tx.id
                )));
            }
        }

        let mut batch = WriteBatch::default();
        for w in unit.accounts {
            self.put_versioned(&mut batch, CF_ACCOUNTS, w.row.id.to_bytes(), w.row, w.expected)?;
        }
        for w in unit.credits {
            self.put_versioned(&mut batch, CF_CREDITS, w.row.id.to_bytes(), w.row, w.expected)?;
        }
        for w in unit.payments {
            self.put_versioned(&mut batch, CF_PAYMENTS, w.row.id.to_bytes(), w.row, w.expected)?;
        }
        for tx in unit.transactions {
            batch.put_cf(tx_handle, tx.id.to_bytes(), serde_json::to_vec(&tx)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}
