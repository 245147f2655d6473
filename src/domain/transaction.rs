use super::ids::{AccountId, TransactionId};
use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    CreditDisbursement,
    CreditPayment,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// One balance-affecting event on an account.
///
/// Records are appended inside the same atomic unit as the balance change they
/// describe and are never rewritten afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub r#type: TransactionType,
    pub amount: Amount,
    /// The other side of a transfer.
    pub counterparty_account_id: Option<AccountId>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        r#type: TransactionType,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account_id,
            r#type,
            amount,
            counterparty_account_id: None,
            status: TransactionStatus::Pending,
            created_at: now,
        }
    }

    pub fn with_counterparty(mut self, counterparty: AccountId) -> Self {
        self.counterparty_account_id = Some(counterparty);
        self
    }

    /// Finalizes the record before it is committed.
    pub fn completed(mut self) -> Self {
        self.status = TransactionStatus::Completed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_wire_names() {
        let json = serde_json::to_string(&TransactionType::CreditDisbursement).unwrap();
        assert_eq!(json, "\"credit-disbursement\"");
        let parsed: TransactionType = serde_json::from_str("\"transfer-out\"").unwrap();
        assert_eq!(parsed, TransactionType::TransferOut);
    }

    #[test]
    fn test_new_transaction_starts_pending() {
        let account = AccountId::new();
        let tx = Transaction::new(
            account,
            TransactionType::Deposit,
            Amount::new(dec!(5)).unwrap(),
            Utc::now(),
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.completed().status, TransactionStatus::Completed);
    }
}
