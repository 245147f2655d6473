use crate::domain::account::AccountKind;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Issue,
    Deactivate,
    ProcessDue,
}

/// One row of an operations file.
///
/// Accounts are named by caller-chosen aliases; which columns are required
/// depends on `op`. Money columns are parsed from their text so no digit is
/// lost to a float.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub op: OperationKind,
    pub user: Option<u64>,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    pub term: Option<u32>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub rate: Option<Decimal>,
    pub kind: Option<AccountKind>,
}

impl OperationRecord {
    pub fn require_user(&self) -> Result<u64> {
        self.user.ok_or_else(|| self.missing("user"))
    }

    pub fn require_account(&self) -> Result<&str> {
        self.account.as_deref().ok_or_else(|| self.missing("account"))
    }

    pub fn require_counterparty(&self) -> Result<&str> {
        self.counterparty
            .as_deref()
            .ok_or_else(|| self.missing("counterparty"))
    }

    pub fn require_amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| self.missing("amount"))
    }

    pub fn require_term(&self) -> Result<u32> {
        self.term.ok_or_else(|| self.missing("term"))
    }

    pub fn require_rate(&self) -> Result<Decimal> {
        self.rate.ok_or_else(|| self.missing("rate"))
    }

    fn missing(&self, column: &str) -> LedgerError {
        LedgerError::InvalidOperation(format!("{:?} requires the '{column}' column", self.op))
    }
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<OperationRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes operations.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
