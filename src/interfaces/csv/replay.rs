use super::account_writer::AccountRow;
use super::operation_reader::{OperationKind, OperationReader, OperationRecord};
use crate::application::engine::LedgerEngine;
use crate::application::payments::PaymentOutcome;
use crate::domain::account::AccountKind;
use crate::domain::ids::{AccountId, UserId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Read;
use tracing::{info, warn};

/// Counts of a finished replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Drives an engine from an operations file, resolving account aliases.
pub struct Replay {
    engine: LedgerEngine,
    /// `process-due` settles payments due at or before this instant (default: now).
    as_of: Option<DateTime<Utc>>,
    aliases: HashMap<String, AccountId>,
    /// Aliases in the order their accounts were opened.
    opened: Vec<String>,
}

impl Replay {
    pub fn new(engine: LedgerEngine, as_of: Option<DateTime<Utc>>) -> Self {
        Self {
            engine,
            as_of,
            aliases: HashMap::new(),
            opened: Vec::new(),
        }
    }

    /// Applies every row of `source`. Malformed or rejected rows are logged
    /// and skipped; only storage faults abort the run.
    pub async fn run<R: Read>(&mut self, source: R) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for (index, record) in OperationReader::new(source).operations().enumerate() {
            let line = index + 2;
            let outcome = match record {
                Ok(record) => self.apply(&record).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => summary.applied += 1,
                Err(err @ (LedgerError::Storage(_) | LedgerError::Io(_))) => return Err(err),
                Err(err) => {
                    warn!(line, error = %err, "operation skipped");
                    summary.rejected += 1;
                }
            }
        }
        info!(applied = summary.applied, rejected = summary.rejected, "replay finished");
        Ok(summary)
    }

    pub async fn apply(&mut self, record: &OperationRecord) -> Result<()> {
        let ledger = self.engine.ledger();
        match record.op {
            OperationKind::Open => {
                let alias = record.require_account()?;
                if self.aliases.contains_key(alias) {
                    return Err(LedgerError::InvalidOperation(format!(
                        "account alias '{alias}' already opened"
                    )));
                }
                let kind = record.kind.unwrap_or(AccountKind::Checking);
                let account = ledger
                    .open_account(UserId(record.require_user()?), kind, None)
                    .await?;
                self.aliases.insert(alias.to_string(), account.id);
                self.opened.push(alias.to_string());
            }
            OperationKind::Deposit => {
                let id = self.resolve(record.require_account()?)?;
                ledger.deposit(id, record.require_amount()?).await?;
            }
            OperationKind::Withdraw => {
                let id = self.resolve(record.require_account()?)?;
                ledger.withdraw(id, record.require_amount()?).await?;
            }
            OperationKind::Transfer => {
                let from = self.resolve(record.require_account()?)?;
                let to = self.resolve(record.require_counterparty()?)?;
                ledger.transfer(from, to, record.require_amount()?).await?;
            }
            OperationKind::Issue => {
                let id = self.resolve(record.require_account()?)?;
                let owner = match record.user {
                    Some(user) => UserId(user),
                    None => ledger.account(id).await?.user_id,
                };
                self.engine
                    .credits()
                    .issue_credit(
                        owner,
                        id,
                        record.require_amount()?,
                        record.require_term()?,
                        record.require_rate()?,
                    )
                    .await?;
            }
            OperationKind::Deactivate => {
                let id = self.resolve(record.require_account()?)?;
                ledger.deactivate(id).await?;
            }
            OperationKind::ProcessDue => self.process_due().await?,
        }
        Ok(())
    }

    async fn process_due(&self) -> Result<()> {
        let payments = self.engine.payments();
        for payment in payments.pending_payments(self.as_of).await? {
            match payments.process_payment(payment.id).await {
                Ok(PaymentOutcome::Failed) => {
                    info!(payment = %payment.id, "installment could not be collected")
                }
                Ok(_) => {}
                Err(err) => warn!(payment = %payment.id, error = %err, "payment processing failed"),
            }
        }
        Ok(())
    }

    fn resolve(&self, alias: &str) -> Result<AccountId> {
        self.aliases
            .get(alias)
            .copied()
            .ok_or_else(|| LedgerError::InvalidAccountId(format!("unknown account alias '{alias}'")))
    }

    /// Final state of every account: replayed aliases in opening order, then
    /// any other stored account under its id.
    pub async fn account_rows(&self) -> Result<Vec<AccountRow>> {
        let labels: HashMap<AccountId, &str> = self
            .aliases
            .iter()
            .map(|(alias, id)| (*id, alias.as_str()))
            .collect();
        let position = |label: &str| self.opened.iter().position(|alias| alias == label);

        let mut rows: Vec<AccountRow> = self
            .engine
            .accounts()
            .await?
            .iter()
            .map(|account| match labels.get(&account.id) {
                Some(alias) => AccountRow::new(*alias, account),
                None => AccountRow::new(account.id.to_string(), account),
            })
            .collect();
        rows.sort_by_key(|row| position(&row.account).unwrap_or(usize::MAX));
        Ok(rows)
    }
}
