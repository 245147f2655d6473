use crate::domain::account::{Account, AccountKind};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One output row: an account under the label the caller knows it by.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountRow {
    pub account: String,
    pub user: u64,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub active: bool,
}

impl AccountRow {
    pub fn new(label: impl Into<String>, account: &Account) -> Self {
        Self {
            account: label.into(),
            user: account.user_id.0,
            kind: account.kind,
            balance: account.balance.value(),
            active: account.is_active,
        }
    }
}

/// Writes account balances as CSV (`account,user,kind,balance,active`).
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, rows: impl IntoIterator<Item = AccountRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
