use super::credit::CreditEngine;
use super::ledger::stage_withdrawal;
use super::locks::RowKey;
use crate::domain::account::Account;
use crate::domain::credit::{CreditStatus, PaymentStatus, ScheduledPayment, sort_by_due_date};
use crate::domain::ids::{CreditId, PaymentId, UserId};
use crate::domain::money::Amount;
use crate::domain::ports::{AtomicUnit, EventKind};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

/// Result of one `process_payment` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The installment was debited from the credit's account.
    Completed(Transaction),
    /// The account could not cover the installment (or was inactive).
    Failed,
    /// The payment had already reached this terminal status; nothing changed.
    AlreadySettled(PaymentStatus),
}

impl PaymentOutcome {
    /// Status of the payment after the call.
    pub fn status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Completed(_) => PaymentStatus::Completed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
            PaymentOutcome::AlreadySettled(status) => *status,
        }
    }
}

/// What a settling commit changed, kept for post-commit notifications.
struct Settlement {
    outcome: PaymentOutcome,
    owner: UserId,
    amount: Amount,
    account: Option<Account>,
    credit_status: CreditStatus,
}

/// Applies scheduled payments against their credit's account.
///
/// A payment moves `pending -> completed` or `pending -> failed` exactly once;
/// the status change, the debit and the credit status update share one
/// atomic unit. Processing a settled payment again changes nothing.
#[derive(Clone)]
pub struct PaymentProcessor {
    credits: CreditEngine,
}

impl PaymentProcessor {
    pub fn new(credits: CreditEngine) -> Self {
        Self { credits }
    }

    #[instrument(skip(self))]
    pub async fn process_payment(&self, payment_id: PaymentId) -> Result<PaymentOutcome> {
        let ctx = self.credits.ledger().context();
        let settlement = ctx
            .with_retries("process_payment", move || self.try_process(payment_id))
            .await?;

        let ledger = self.credits.ledger();
        match &settlement.outcome {
            PaymentOutcome::Completed(_) => {
                info!(payment = %payment_id, amount = %settlement.amount, credit_status = ?settlement.credit_status, "installment paid");
                if let Some(account) = &settlement.account {
                    ledger
                        .notify_debit(account, settlement.amount, EventKind::PaymentCompleted)
                        .await;
                }
            }
            PaymentOutcome::Failed => {
                info!(payment = %payment_id, amount = %settlement.amount, credit_status = ?settlement.credit_status, "installment failed");
                ledger
                    .notify(
                        settlement.owner,
                        settlement.amount.value(),
                        EventKind::PaymentFailed,
                    )
                    .await;
            }
            PaymentOutcome::AlreadySettled(status) => {
                debug!(payment = %payment_id, ?status, "payment already settled");
            }
        }
        Ok(settlement.outcome)
    }

    async fn try_process(&self, payment_id: PaymentId) -> Result<Settlement> {
        let ctx = self.credits.ledger().context();

        // Unlocked read, only to learn which rows to lock.
        let peek = ctx
            .store
            .payment(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;
        let credit_id = peek.value.credit_id;
        let peek_credit = ctx
            .store
            .credit(credit_id)
            .await?
            .ok_or(LedgerError::CreditNotFound(credit_id))?;
        let account_id = peek_credit.value.account_id;

        let _rows = ctx
            .locks
            .acquire([
                RowKey::Account(account_id),
                RowKey::Credit(credit_id),
                RowKey::Payment(payment_id),
            ])
            .await;

        let mut payment = ctx
            .store
            .payment(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;
        let mut credit = ctx
            .store
            .credit(credit_id)
            .await?
            .ok_or(LedgerError::CreditNotFound(credit_id))?;
        let owner = credit.value.user_id;
        let amount = payment.value.amount;

        if payment.value.status.is_terminal() {
            return Ok(Settlement {
                outcome: PaymentOutcome::AlreadySettled(payment.value.status),
                owner,
                amount,
                account: None,
                credit_status: credit.value.status,
            });
        }

        let account = self.credits.ledger().load_account(account_id).await?;
        let now = ctx.clock.now();
        let mut unit = AtomicUnit::new();

        let (status, staged) = match stage_withdrawal(
            &mut unit,
            account,
            amount,
            TransactionType::CreditPayment,
            None,
            now,
        ) {
            Ok(staged) => (PaymentStatus::Completed, Some(staged)),
            Err(err @ (LedgerError::InsufficientFunds { .. } | LedgerError::AccountInactive(_))) => {
                debug!(payment = %payment_id, error = %err, "installment not collectable");
                (PaymentStatus::Failed, None)
            }
            Err(err) => return Err(err),
        };

        let siblings = ctx.store.payments_by_credit(credit_id).await?;
        let others = siblings.iter().filter(|p| p.id != payment_id);
        let remaining_pending = others
            .clone()
            .filter(|p| p.status == PaymentStatus::Pending)
            .count();
        let failed_installments = others.filter(|p| p.status == PaymentStatus::Failed).count()
            + usize::from(status == PaymentStatus::Failed);
        credit
            .value
            .apply_installment_outcome(status, remaining_pending, failed_installments);
        let credit_status = credit.value.status;
        // Written even when unchanged, so sibling settlements serialize on the credit row.
        unit.update_credit(credit);

        payment.value.settle(status, now);
        unit.update_payment(payment);
        ctx.store.commit(unit).await?;

        let (outcome, account) = match staged {
            Some(staged) => (
                PaymentOutcome::Completed(staged.transaction),
                Some(staged.account),
            ),
            None => (PaymentOutcome::Failed, None),
        };
        Ok(Settlement {
            outcome,
            owner,
            amount,
            account,
            credit_status,
        })
    }

    /// Pending payments due at or before `as_of` (default: now), earliest first.
    pub async fn pending_payments(
        &self,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduledPayment>> {
        let ctx = self.credits.ledger().context();
        let as_of = as_of.unwrap_or_else(|| ctx.clock.now());
        let mut due = ctx.store.pending_payments_due(as_of).await?;
        sort_by_due_date(&mut due);
        Ok(due)
    }

    /// All installments of a credit, earliest due first.
    pub async fn payments_for_credit(&self, credit_id: CreditId) -> Result<Vec<ScheduledPayment>> {
        self.credits.schedule(credit_id).await
    }
}
