use super::context::LedgerContext;
use super::credit::CreditEngine;
use super::ledger::AccountLedger;
use super::payments::PaymentProcessor;
use super::scheduler::Scheduler;
use crate::config::EngineConfig;
use crate::domain::account::Account;
use crate::domain::ports::{SharedClock, SharedLedgerStore, SharedNotifier};
use crate::error::Result;
use std::sync::Arc;

/// The main entry point of the ledger.
///
/// `LedgerEngine` wires the store, clock and notifier into each component and
/// hands out cheap clones of them. All components share one set of row locks,
/// so operations issued through any of them serialize on the rows they touch.
#[derive(Clone)]
pub struct LedgerEngine {
    ledger: AccountLedger,
    credits: CreditEngine,
    payments: PaymentProcessor,
    scheduler: Scheduler,
    ctx: Arc<LedgerContext>,
}

impl LedgerEngine {
    /// Creates a new `LedgerEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Durable storage for every ledger table.
    /// * `notifier` - Receives post-commit customer notifications.
    /// * `clock` - Source of every timestamp the engine records.
    /// * `config` - Retry, alerting and scheduling settings.
    pub fn new(
        store: SharedLedgerStore,
        notifier: SharedNotifier,
        clock: SharedClock,
        config: EngineConfig,
    ) -> Self {
        let interval = config.scheduler_interval;
        let ctx = Arc::new(LedgerContext::new(store, notifier, clock, config));
        let ledger = AccountLedger::new(ctx.clone());
        let credits = CreditEngine::new(ledger.clone());
        let payments = PaymentProcessor::new(credits.clone());
        let scheduler = Scheduler::new(payments.clone(), interval);
        Self {
            ledger,
            credits,
            payments,
            scheduler,
            ctx,
        }
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn credits(&self) -> &CreditEngine {
        &self.credits
    }

    pub fn payments(&self) -> &PaymentProcessor {
        &self.payments
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Every account in the store, oldest first.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.ctx.store.all_accounts().await?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }
}
