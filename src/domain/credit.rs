use super::amortization::{CreditTerms, Installment};
use super::ids::{AccountId, CreditId, PaymentId, UserId};
use super::money::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    Active,
    Closed,
    Overdue,
    Rejected,
}

/// An installment credit disbursed into an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Credit {
    pub id: CreditId,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub principal_amount: Amount,
    pub annual_interest_rate: Decimal,
    pub term_months: u32,
    /// Fixed for the life of the credit.
    pub monthly_payment: Decimal,
    pub status: CreditStatus,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    pub fn new(
        user_id: UserId,
        account_id: AccountId,
        terms: &CreditTerms,
        monthly_payment: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CreditId::new(),
            user_id,
            account_id,
            principal_amount: terms.principal,
            annual_interest_rate: terms.annual_rate,
            term_months: terms.term_months,
            monthly_payment,
            status: CreditStatus::Active,
            created_at: now,
        }
    }

    /// Applies the outcome of one installment to the credit status.
    ///
    /// A failed installment puts an active credit into arrears. A credit closes
    /// once nothing is pending and no installment failed. Returns whether the
    /// status changed.
    pub fn apply_installment_outcome(
        &mut self,
        outcome: PaymentStatus,
        remaining_pending: usize,
        failed_installments: usize,
    ) -> bool {
        let next = match (self.status, outcome) {
            (CreditStatus::Active, PaymentStatus::Failed) => CreditStatus::Overdue,
            (CreditStatus::Active, PaymentStatus::Completed)
                if remaining_pending == 0 && failed_installments == 0 =>
            {
                CreditStatus::Closed
            }
            (status, _) => status,
        };
        let changed = next != self.status;
        self.status = next;
        changed
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// One installment of a credit's repayment plan.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ScheduledPayment {
    pub id: PaymentId,
    pub credit_id: CreditId,
    pub amount: Amount,
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
    pub due_date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl ScheduledPayment {
    pub fn from_installment(
        credit_id: CreditId,
        installment: &Installment,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            id: PaymentId::new(),
            credit_id,
            amount: Amount::new(installment.amount)?,
            principal_portion: installment.principal_portion,
            interest_portion: installment.interest_portion,
            due_date: installment.due_date,
            status: PaymentStatus::Pending,
            created_at: now,
            processed_at: None,
        })
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && self.due_date <= as_of
    }

    /// Moves a pending payment into a terminal state.
    pub fn settle(&mut self, outcome: PaymentStatus, now: DateTime<Utc>) {
        debug_assert!(!self.status.is_terminal());
        self.status = outcome;
        self.processed_at = Some(now);
    }
}

/// Orders payments oldest-due first, ties broken by creation order.
pub fn sort_by_due_date(payments: &mut [ScheduledPayment]) {
    payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn credit() -> Credit {
        let terms = CreditTerms::new(dec!(1000), dec!(12), 2).unwrap();
        Credit::new(UserId(7), AccountId::new(), &terms, dec!(507.51), Utc::now())
    }

    #[test]
    fn test_failed_installment_marks_overdue() {
        let mut credit = credit();
        assert!(credit.apply_installment_outcome(PaymentStatus::Failed, 1, 1));
        assert_eq!(credit.status, CreditStatus::Overdue);

        // Later successes do not clear arrears.
        assert!(!credit.apply_installment_outcome(PaymentStatus::Completed, 0, 1));
        assert_eq!(credit.status, CreditStatus::Overdue);
    }

    #[test]
    fn test_last_completed_installment_closes_credit() {
        let mut credit = credit();
        assert!(!credit.apply_installment_outcome(PaymentStatus::Completed, 1, 0));
        assert_eq!(credit.status, CreditStatus::Active);
        assert!(credit.apply_installment_outcome(PaymentStatus::Completed, 0, 0));
        assert_eq!(credit.status, CreditStatus::Closed);
    }

    #[test]
    fn test_is_due_only_for_pending() {
        let now = Utc::now();
        let mut payment = ScheduledPayment {
            id: PaymentId::new(),
            credit_id: CreditId::new(),
            amount: Amount::new(dec!(10)).unwrap(),
            principal_portion: dec!(9),
            interest_portion: dec!(1),
            due_date: now,
            status: PaymentStatus::Pending,
            created_at: now,
            processed_at: None,
        };
        assert!(payment.is_due(now));
        assert!(!payment.is_due(now - chrono::Duration::seconds(1)));

        payment.settle(PaymentStatus::Completed, now);
        assert!(!payment.is_due(now));
        assert_eq!(payment.processed_at, Some(now));
    }
}
