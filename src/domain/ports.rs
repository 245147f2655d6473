use super::account::Account;
use super::credit::{Credit, ScheduledPayment};
use super::ids::{AccountId, CreditId, PaymentId, UserId};
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A committed row together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

/// What a write expects to find in the store when it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The row must not exist yet.
    Absent,
    /// The row must still be at this version.
    Version(u64),
}

impl Expected {
    /// Whether a row currently at `current` (or missing) satisfies this expectation.
    pub fn admits(&self, current: Option<u64>) -> bool {
        match (self, current) {
            (Expected::Absent, None) => true,
            (Expected::Version(expected), Some(found)) => *expected == found,
            _ => false,
        }
    }

    /// Version the row carries once the write is applied.
    pub fn next_version(&self) -> u64 {
        match self {
            Expected::Absent => 1,
            Expected::Version(v) => v + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowWrite<T> {
    pub row: T,
    pub expected: Expected,
}

/// A set of writes that the store applies entirely or not at all.
///
/// Engine operations stage every row they change into one unit and hand it to
/// [`LedgerStore::commit`]. If any expectation no longer holds, the store
/// rejects the whole unit with `ConcurrencyConflict` and nothing is written.
#[derive(Debug, Default, Clone)]
pub struct AtomicUnit {
    pub accounts: Vec<RowWrite<Account>>,
    pub credits: Vec<RowWrite<Credit>>,
    pub payments: Vec<RowWrite<ScheduledPayment>>,
    pub transactions: Vec<Transaction>,
}

impl AtomicUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&mut self, account: Account) {
        self.accounts.push(RowWrite {
            row: account,
            expected: Expected::Absent,
        });
    }

    pub fn update_account(&mut self, account: Versioned<Account>) {
        self.accounts.push(RowWrite {
            row: account.value,
            expected: Expected::Version(account.version),
        });
    }

    pub fn insert_credit(&mut self, credit: Credit) {
        self.credits.push(RowWrite {
            row: credit,
            expected: Expected::Absent,
        });
    }

    pub fn update_credit(&mut self, credit: Versioned<Credit>) {
        self.credits.push(RowWrite {
            row: credit.value,
            expected: Expected::Version(credit.version),
        });
    }

    pub fn insert_payment(&mut self, payment: ScheduledPayment) {
        self.payments.push(RowWrite {
            row: payment,
            expected: Expected::Absent,
        });
    }

    pub fn update_payment(&mut self, payment: Versioned<ScheduledPayment>) {
        self.payments.push(RowWrite {
            row: payment.value,
            expected: Expected::Version(payment.version),
        });
    }

    /// Appends a transaction record; records are insert-only.
    pub fn append(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.credits.is_empty()
            && self.payments.is_empty()
            && self.transactions.is_empty()
    }
}

/// Durable keyed storage for every ledger table.
///
/// Reads return committed snapshots. Collection reads carry no ordering
/// guarantee; callers sort.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>>;
    async fn accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
    async fn transactions_by_account(&self, account_id: AccountId) -> Result<Vec<Transaction>>;
    async fn credit(&self, id: CreditId) -> Result<Option<Versioned<Credit>>>;
    async fn credits_by_user(&self, user_id: UserId) -> Result<Vec<Credit>>;
    async fn payment(&self, id: PaymentId) -> Result<Option<Versioned<ScheduledPayment>>>;
    async fn payments_by_credit(&self, credit_id: CreditId) -> Result<Vec<ScheduledPayment>>;
    async fn pending_payments_due(&self, as_of: DateTime<Utc>) -> Result<Vec<ScheduledPayment>>;
    /// Applies every write of `unit` atomically, or none of them.
    async fn commit(&self, unit: AtomicUnit) -> Result<()>;
}

pub type SharedLedgerStore = Arc<dyn LedgerStore>;

/// Source of the current time, injected so tests can move it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Deposit,
    Withdrawal,
    TransferSent,
    TransferReceived,
    CreditDisbursed,
    PaymentCompleted,
    PaymentFailed,
    LowBalance,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdrawal => "withdrawal",
            EventKind::TransferSent => "transfer-sent",
            EventKind::TransferReceived => "transfer-received",
            EventKind::CreditDisbursed => "credit-disbursed",
            EventKind::PaymentCompleted => "payment-completed",
            EventKind::PaymentFailed => "payment-failed",
            EventKind::LowBalance => "low-balance",
        })
    }
}

/// A message for the account owner about a committed ledger event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub amount: Decimal,
    pub kind: EventKind,
}

/// Delivery channel for customer notifications (email, push, ...).
///
/// Called only after the ledger mutation has committed. A delivery failure is
/// logged by the caller and never undoes the mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        notification: Notification,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub type SharedNotifier = Arc<dyn Notifier>;
pub type SharedClock = Arc<dyn Clock>;
