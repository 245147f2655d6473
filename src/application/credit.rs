use super::ledger::{AccountLedger, stage_deposit};
use super::locks::RowKey;
use crate::domain::amortization::{AmortizationSchedule, CreditTerms};
use crate::domain::credit::{Credit, ScheduledPayment, sort_by_due_date};
use crate::domain::ids::{AccountId, CreditId, UserId};
use crate::domain::ports::{AtomicUnit, EventKind};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

/// Everything written by a successful credit issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCredit {
    pub credit: Credit,
    /// Installments in due-date order.
    pub schedule: Vec<ScheduledPayment>,
    pub disbursement: Transaction,
}

/// Issues installment credits and answers questions about them.
#[derive(Clone)]
pub struct CreditEngine {
    ledger: AccountLedger,
}

impl CreditEngine {
    pub fn new(ledger: AccountLedger) -> Self {
        Self { ledger }
    }

    pub(crate) fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    /// Computes the repayment plan for prospective terms without touching storage.
    pub fn quote(
        &self,
        principal: Decimal,
        term_months: u32,
        annual_rate: Decimal,
    ) -> Result<AmortizationSchedule> {
        let terms = CreditTerms::new(principal, annual_rate, term_months)?;
        AmortizationSchedule::compute(&terms, self.ledger.context().clock.now())
    }

    /// Creates a credit with its full payment schedule and disburses the
    /// principal into `account_id`, all in one atomic unit.
    #[instrument(skip(self))]
    pub async fn issue_credit(
        &self,
        user_id: UserId,
        account_id: AccountId,
        principal: Decimal,
        term_months: u32,
        annual_rate: Decimal,
    ) -> Result<IssuedCredit> {
        let terms = CreditTerms::new(principal, annual_rate, term_months)
            .inspect_err(|err| debug!(error = %err, "credit terms rejected"))?;
        let issued = self
            .ledger
            .context()
            .with_retries("issue_credit", move || {
                self.try_issue(user_id, account_id, terms)
            })
            .await?;

        info!(
            credit = %issued.credit.id,
            account = %account_id,
            principal = %terms.principal,
            monthly_payment = %issued.credit.monthly_payment,
            installments = issued.schedule.len(),
            "credit issued"
        );
        self.ledger
            .notify(user_id, terms.principal.value(), EventKind::CreditDisbursed)
            .await;
        Ok(issued)
    }

    async fn try_issue(
        &self,
        user_id: UserId,
        account_id: AccountId,
        terms: CreditTerms,
    ) -> Result<IssuedCredit> {
        let ctx = self.ledger.context();
        let _rows = ctx.locks.acquire([RowKey::Account(account_id)]).await;
        let account = self.ledger.load_account(account_id).await?;
        account.value.ensure_active()?;

        let now = ctx.clock.now();
        let plan = AmortizationSchedule::compute(&terms, now)?;
        let credit = Credit::new(user_id, account_id, &terms, plan.monthly_payment, now);
        let schedule = plan
            .installments
            .iter()
            .map(|installment| ScheduledPayment::from_installment(credit.id, installment, now))
            .collect::<Result<Vec<_>>>()?;

        let mut unit = AtomicUnit::new();
        unit.insert_credit(credit.clone());
        for payment in &schedule {
            unit.insert_payment(payment.clone());
        }
        let staged = stage_deposit(
            &mut unit,
            account,
            terms.principal,
            TransactionType::CreditDisbursement,
            None,
            now,
        )?;
        ctx.store.commit(unit).await?;

        Ok(IssuedCredit {
            credit,
            schedule,
            disbursement: staged.transaction,
        })
    }

    pub async fn credit(&self, credit_id: CreditId) -> Result<Credit> {
        self.ledger
            .context()
            .store
            .credit(credit_id)
            .await?
            .map(|row| row.value)
            .ok_or(LedgerError::CreditNotFound(credit_id))
    }

    /// Credits owned by a user, oldest first.
    pub async fn credits_for_user(&self, user_id: UserId) -> Result<Vec<Credit>> {
        let mut credits = self.ledger.context().store.credits_by_user(user_id).await?;
        credits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(credits)
    }

    /// The credit's installments, earliest due first.
    pub async fn schedule(&self, credit_id: CreditId) -> Result<Vec<ScheduledPayment>> {
        self.credit(credit_id).await?;
        let mut payments = self
            .ledger
            .context()
            .store
            .payments_by_credit(credit_id)
            .await?;
        sort_by_due_date(&mut payments);
        Ok(payments)
    }
}
