use super::context::LedgerContext;
use super::locks::RowKey;
use crate::domain::account::{Account, AccountKind};
use crate::domain::ids::{AccountId, UserId};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{AtomicUnit, EventKind, Notification, Versioned};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// An account mutation staged into an [`AtomicUnit`] but not yet committed.
#[derive(Debug, Clone)]
pub(crate) struct Staged {
    pub account: Account,
    pub transaction: Transaction,
}

/// Applies a credit to `row` and stages the account update plus its record.
pub(crate) fn stage_deposit(
    unit: &mut AtomicUnit,
    mut row: Versioned<Account>,
    amount: Amount,
    r#type: TransactionType,
    counterparty: Option<AccountId>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Staged> {
    row.value.deposit(amount, now)?;
    Ok(stage(unit, row, amount, r#type, counterparty, now))
}

/// Applies a debit to `row` and stages it. Nothing is staged when the balance
/// does not cover `amount`.
pub(crate) fn stage_withdrawal(
    unit: &mut AtomicUnit,
    mut row: Versioned<Account>,
    amount: Amount,
    r#type: TransactionType,
    counterparty: Option<AccountId>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Staged> {
    row.value.withdraw(amount, now)?;
    Ok(stage(unit, row, amount, r#type, counterparty, now))
}

fn stage(
    unit: &mut AtomicUnit,
    row: Versioned<Account>,
    amount: Amount,
    r#type: TransactionType,
    counterparty: Option<AccountId>,
    now: chrono::DateTime<chrono::Utc>,
) -> Staged {
    let mut transaction = Transaction::new(row.value.id, r#type, amount, now);
    if let Some(other) = counterparty {
        transaction = transaction.with_counterparty(other);
    }
    let transaction = transaction.completed();
    let account = row.value.clone();
    unit.update_account(row);
    unit.append(transaction.clone());
    Staged {
        account,
        transaction,
    }
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub outgoing: Transaction,
    pub incoming: Transaction,
}

/// Balance-mutating operations on accounts.
///
/// Each operation locks the rows it touches, reads them, and commits every
/// change it makes (balances and transaction records) as one atomic unit.
#[derive(Clone)]
pub struct AccountLedger {
    ctx: Arc<LedgerContext>,
}

impl AccountLedger {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    pub(crate) fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    /// Opens an active, empty account. `currency` falls back to the configured default.
    #[instrument(skip(self))]
    pub async fn open_account(
        &self,
        user_id: UserId,
        kind: AccountKind,
        currency: Option<String>,
    ) -> Result<Account> {
        let currency = currency.unwrap_or_else(|| self.ctx.config.default_currency.clone());
        let account = Account::open(user_id, kind, currency, self.ctx.clock.now());

        let mut unit = AtomicUnit::new();
        unit.insert_account(account.clone());
        self.ctx.store.commit(unit).await?;

        info!(account = %account.id, "account opened");
        Ok(account)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account> {
        Ok(self.load_account(account_id).await?.value)
    }

    /// Point-in-time balance; reflects committed operations only.
    pub async fn balance(&self, account_id: AccountId) -> Result<Balance> {
        Ok(self.account(account_id).await?.balance)
    }

    /// All accounts of a user, oldest first.
    pub async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        let mut accounts = self.ctx.store.accounts_by_user(user_id).await?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    /// Transaction history of an account, oldest first.
    pub async fn transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.load_account(account_id).await?;
        let mut history = self.ctx.store.transactions_by_account(account_id).await?;
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(history)
    }

    #[instrument(skip(self))]
    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        let staged = self
            .ctx
            .with_retries("deposit", move || self.try_deposit(account_id, amount))
            .await?;

        info!(account = %account_id, %amount, balance = %staged.account.balance, "deposit committed");
        self.notify(staged.account.user_id, amount.value(), EventKind::Deposit)
            .await;
        Ok(staged.transaction)
    }

    async fn try_deposit(&self, account_id: AccountId, amount: Amount) -> Result<Staged> {
        let _rows = self.ctx.locks.acquire([RowKey::Account(account_id)]).await;
        let row = self.load_account(account_id).await?;

        let mut unit = AtomicUnit::new();
        let staged = stage_deposit(
            &mut unit,
            row,
            amount,
            TransactionType::Deposit,
            None,
            self.ctx.clock.now(),
        )?;
        self.ctx.store.commit(unit).await?;
        Ok(staged)
    }

    #[instrument(skip(self))]
    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        let staged = self
            .ctx
            .with_retries("withdraw", move || self.try_withdraw(account_id, amount))
            .await
            .inspect_err(|err| debug!(account = %account_id, %amount, error = %err, "withdrawal rejected"))?;

        info!(account = %account_id, %amount, balance = %staged.account.balance, "withdrawal committed");
        self.notify_debit(&staged.account, amount, EventKind::Withdrawal)
            .await;
        Ok(staged.transaction)
    }

    async fn try_withdraw(&self, account_id: AccountId, amount: Amount) -> Result<Staged> {
        let _rows = self.ctx.locks.acquire([RowKey::Account(account_id)]).await;
        let row = self.load_account(account_id).await?;

        let mut unit = AtomicUnit::new();
        let staged = stage_withdrawal(
            &mut unit,
            row,
            amount,
            TransactionType::Withdrawal,
            None,
            self.ctx.clock.now(),
        )?;
        self.ctx.store.commit(unit).await?;
        Ok(staged)
    }

    /// Moves `amount` between two accounts; both legs commit together or not at all.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        if from_id == to_id {
            return Err(LedgerError::InvalidAccountId(format!(
                "cannot transfer from account {from_id} to itself"
            )));
        }
        let amount = Amount::new(amount)?;
        let (source, destination) = self
            .ctx
            .with_retries("transfer", move || self.try_transfer(from_id, to_id, amount))
            .await
            .inspect_err(|err| debug!(from = %from_id, to = %to_id, %amount, error = %err, "transfer rejected"))?;

        info!(from = %from_id, to = %to_id, %amount, "transfer committed");
        self.notify_debit(&source.account, amount, EventKind::TransferSent)
            .await;
        self.notify(
            destination.account.user_id,
            amount.value(),
            EventKind::TransferReceived,
        )
        .await;

        Ok(TransferReceipt {
            outgoing: source.transaction,
            incoming: destination.transaction,
        })
    }

    async fn try_transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    ) -> Result<(Staged, Staged)> {
        let _rows = self
            .ctx
            .locks
            .acquire([RowKey::Account(from_id), RowKey::Account(to_id)])
            .await;
        let source = self.load_account(from_id).await?;
        let destination = self.load_account(to_id).await?;
        let now = self.ctx.clock.now();

        let mut unit = AtomicUnit::new();
        let outgoing = stage_withdrawal(
            &mut unit,
            source,
            amount,
            TransactionType::TransferOut,
            Some(to_id),
            now,
        )?;
        let incoming = stage_deposit(
            &mut unit,
            destination,
            amount,
            TransactionType::TransferIn,
            Some(from_id),
            now,
        )?;
        self.ctx.store.commit(unit).await?;
        Ok((outgoing, incoming))
    }

    /// Marks an account inactive. Deactivating twice is a no-op.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, account_id: AccountId) -> Result<Account> {
        self.ctx
            .with_retries("deactivate", move || self.try_deactivate(account_id))
            .await
    }

    async fn try_deactivate(&self, account_id: AccountId) -> Result<Account> {
        let _rows = self.ctx.locks.acquire([RowKey::Account(account_id)]).await;
        let mut row = self.load_account(account_id).await?;
        if !row.value.is_active {
            return Ok(row.value);
        }

        row.value.deactivate(self.ctx.clock.now());
        let account = row.value.clone();
        let mut unit = AtomicUnit::new();
        unit.update_account(row);
        self.ctx.store.commit(unit).await?;

        info!(account = %account_id, "account deactivated");
        Ok(account)
    }

    pub(crate) async fn load_account(&self, account_id: AccountId) -> Result<Versioned<Account>> {
        self.ctx
            .store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Best-effort delivery; a failure is logged and otherwise ignored.
    pub(crate) async fn notify(&self, recipient: UserId, amount: Decimal, kind: EventKind) {
        let notification = Notification {
            recipient,
            amount,
            kind,
        };
        if let Err(err) = self.ctx.notifier.notify(notification).await {
            warn!(%recipient, %kind, error = %err, "notification delivery failed");
        }
    }

    /// Notifies about a debit, adding a low-balance alert when the remaining
    /// balance fell under the configured threshold.
    pub(crate) async fn notify_debit(&self, account: &Account, amount: Amount, kind: EventKind) {
        self.notify(account.user_id, amount.value(), kind).await;
        if account.balance.value() < self.ctx.config.low_balance_threshold {
            self.notify(account.user_id, account.balance.value(), EventKind::LowBalance)
                .await;
        }
    }
}
