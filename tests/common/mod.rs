#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use credit_ledger::application::engine::LedgerEngine;
use credit_ledger::config::EngineConfig;
use credit_ledger::domain::account::{Account, AccountKind};
use credit_ledger::domain::ids::UserId;
use credit_ledger::domain::ports::{Clock, EventKind, Notification, Notifier};
use credit_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Keeps every notification; optionally fails each delivery after recording it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.sent().into_iter().map(|n| n.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sent.lock().unwrap().push(notification);
        if self.fail {
            Err("mail server unreachable".into())
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub engine: LedgerEngine,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(RecordingNotifier::default(), EngineConfig::default())
}

pub fn harness_with(notifier: RecordingNotifier, config: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let notifier = Arc::new(notifier);
    let engine = LedgerEngine::new(
        Arc::new(InMemoryLedgerStore::new()),
        notifier.clone(),
        clock.clone(),
        config,
    );
    Harness {
        engine,
        clock,
        notifier,
    }
}

impl Harness {
    pub async fn open(&self, user: u64) -> Account {
        self.engine
            .ledger()
            .open_account(UserId(user), AccountKind::Checking, None)
            .await
            .unwrap()
    }

    pub async fn funded(&self, user: u64, amount: Decimal) -> Account {
        let account = self.open(user).await;
        self.engine.ledger().deposit(account.id, amount).await.unwrap();
        account
    }

    pub async fn balance(&self, account: &Account) -> Decimal {
        self.engine
            .ledger()
            .balance(account.id)
            .await
            .unwrap()
            .value()
    }
}

/// Writes an operations file: `accounts` funded accounts, then `rows`
/// transfers cycling between them.
pub fn generate_operations_csv(path: &Path, accounts: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["op", "user", "account", "counterparty", "amount", "term", "rate", "kind"])?;
    for i in 0..accounts {
        let alias = format!("acc{i}");
        wtr.write_record(["open", &i.to_string(), &alias, "", "", "", "", "checking"])?;
        wtr.write_record(["deposit", "", &alias, "", "100.00", "", "", ""])?;
    }
    for i in 0..rows {
        let from = format!("acc{}", i % accounts);
        let to = format!("acc{}", (i + 1) % accounts);
        wtr.write_record(["transfer", "", &from, &to, "1.00", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
