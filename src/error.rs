use crate::domain::ids::{AccountId, CreditId, PaymentId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by the ledger engine and its storage backends.
///
/// Business-rule failures (`InsufficientFunds`, `InvalidAmount`, ...) are terminal
/// results for the caller. `ConcurrencyConflict` never leaves the engine: it is
/// retried internally and becomes `Contention` once the retry budget is spent.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
    #[error("Credit {0} not found")]
    CreditNotFound(CreditId),
    #[error("Scheduled payment {0} not found")]
    PaymentNotFound(PaymentId),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds on account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),
    #[error("Concurrent modification detected: {0}")]
    ConcurrencyConflict(String),
    #[error("{operation} abandoned after {attempts} conflicting attempts")]
    Contention {
        operation: &'static str,
        attempts: u32,
    },
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// Wraps any backend failure as an opaque storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage(err.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(what.into())
    }

    /// Infrastructure failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_) | Self::Contention { .. } | Self::Storage(_) | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(err)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::storage(err)
    }
}
