use super::ids::{AccountId, UserId};
use super::money::{Amount, Balance};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product kind of an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Credit => "credit",
        })
    }
}

impl FromStr for AccountKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "credit" => Ok(AccountKind::Credit),
            other => Err(LedgerError::InvalidId(format!("unknown account kind '{other}'"))),
        }
    }
}

/// A customer account.
///
/// The balance never drops below zero once an operation has committed. Accounts
/// are deactivated rather than deleted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub balance: Balance,
    pub kind: AccountKind,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(
        user_id: UserId,
        kind: AccountKind,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            user_id,
            balance: Balance::ZERO,
            kind,
            currency: currency.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.is_active {
            Ok(())
        } else {
            Err(LedgerError::AccountInactive(self.id))
        }
    }

    /// Credits funds to the balance.
    pub fn deposit(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.ensure_active()?;
        let updated = self
            .balance
            .0
            .checked_add(amount.value())
            .ok_or_else(|| LedgerError::InvalidAmount(format!("deposit of {amount} overflows")))?;
        self.balance = Balance::new(updated);
        self.updated_at = now;
        Ok(())
    }

    /// Debits funds if the balance covers the amount.
    pub fn withdraw(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.ensure_active()?;
        if !self.balance.covers(amount) {
            return Err(LedgerError::InsufficientFunds {
                account: self.id,
                available: self.balance.value(),
                requested: amount.value(),
            });
        }
        self.balance -= amount.into();
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }
}
