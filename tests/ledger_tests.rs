use credit_ledger::domain::account::AccountKind;
use credit_ledger::domain::ids::{AccountId, UserId};
use credit_ledger::domain::ports::EventKind;
use credit_ledger::domain::transaction::{TransactionStatus, TransactionType};
use credit_ledger::error::LedgerError;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod common;

#[tokio::test]
async fn test_deposit_withdraw_transfer_scenario() {
    let h = common::harness();
    let ledger = h.engine.ledger();
    let a = h.open(1).await;
    let b = h.open(2).await;

    ledger.deposit(a.id, dec!(500)).await.unwrap();
    assert_eq!(h.balance(&a).await, dec!(500));
    let history = ledger.transactions(a.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].r#type, TransactionType::Deposit);
    assert_eq!(history[0].status, TransactionStatus::Completed);

    let err = ledger.withdraw(a.id, dec!(600)).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds { available, requested, .. }
            if available == dec!(500) && requested == dec!(600)
    ));
    assert_eq!(h.balance(&a).await, dec!(500));
    assert_eq!(ledger.transactions(a.id).await.unwrap().len(), 1);

    let receipt = ledger.transfer(a.id, b.id, dec!(500)).await.unwrap();
    assert_eq!(h.balance(&a).await, dec!(0));
    assert_eq!(h.balance(&b).await, dec!(500));
    assert_eq!(receipt.outgoing.r#type, TransactionType::TransferOut);
    assert_eq!(receipt.outgoing.counterparty_account_id, Some(b.id));
    assert_eq!(receipt.incoming.r#type, TransactionType::TransferIn);
    assert_eq!(receipt.incoming.counterparty_account_id, Some(a.id));
    assert_eq!(ledger.transactions(b.id).await.unwrap(), vec![receipt.incoming]);
}

#[tokio::test]
async fn test_invalid_amounts_are_rejected() {
    let h = common::harness();
    let a = h.open(1).await;
    let ledger = h.engine.ledger();

    for amount in [dec!(0), dec!(-5), dec!(0.001)] {
        assert!(matches!(
            ledger.deposit(a.id, amount).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }
    assert!(ledger.transactions(a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_self_transfer_is_rejected() {
    let h = common::harness();
    let a = h.funded(1, dec!(100)).await;
    assert!(matches!(
        h.engine.ledger().transfer(a.id, a.id, dec!(10)).await,
        Err(LedgerError::InvalidAccountId(_))
    ));
    assert_eq!(h.balance(&a).await, dec!(100));
}

#[tokio::test]
async fn test_failed_transfer_leaves_no_trace() {
    let h = common::harness();
    let ledger = h.engine.ledger();
    let a = h.funded(1, dec!(100)).await;
    let b = h.funded(2, dec!(50)).await;

    assert!(matches!(
        ledger.transfer(a.id, b.id, dec!(100.01)).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    let missing = AccountId::new();
    assert!(matches!(
        ledger.transfer(a.id, missing, dec!(10)).await,
        Err(LedgerError::AccountNotFound(id)) if id == missing
    ));

    assert_eq!(h.balance(&a).await, dec!(100));
    assert_eq!(h.balance(&b).await, dec!(50));
    assert_eq!(ledger.transactions(a.id).await.unwrap().len(), 1);
    assert_eq!(ledger.transactions(b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_inactive_account_rejects_mutations() {
    let h = common::harness();
    let ledger = h.engine.ledger();
    let a = h.funded(1, dec!(100)).await;
    let b = h.open(2).await;

    let closed = ledger.deactivate(a.id).await.unwrap();
    assert!(!closed.is_active);
    // Idempotent.
    assert!(!ledger.deactivate(a.id).await.unwrap().is_active);

    assert!(matches!(
        ledger.deposit(a.id, dec!(1)).await,
        Err(LedgerError::AccountInactive(id)) if id == a.id
    ));
    assert!(matches!(
        ledger.withdraw(a.id, dec!(1)).await,
        Err(LedgerError::AccountInactive(_))
    ));
    assert!(matches!(
        ledger.transfer(b.id, a.id, dec!(1)).await,
        Err(LedgerError::AccountInactive(_))
    ));
    assert_eq!(h.balance(&a).await, dec!(100));
}

#[tokio::test]
async fn test_accounts_for_user_oldest_first() {
    let h = common::harness();
    let ledger = h.engine.ledger();
    let first = h.open(7).await;
    h.clock.advance(chrono::Duration::minutes(1));
    let second = ledger
        .open_account(UserId(7), AccountKind::Savings, Some("USD".to_string()))
        .await
        .unwrap();
    h.open(8).await;

    let accounts = ledger.accounts_for_user(UserId(7)).await.unwrap();
    let ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(accounts[1].currency, "USD");
    assert!(ledger.accounts_for_user(UserId(9)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notifications_follow_commits() {
    let h = common::harness();
    let ledger = h.engine.ledger();
    let a = h.funded(1, dec!(5000)).await;
    let b = h.open(2).await;

    ledger.withdraw(a.id, dec!(1000)).await.unwrap();
    ledger.transfer(a.id, b.id, dec!(3500)).await.unwrap();
    let _ = ledger.withdraw(a.id, dec!(1000)).await;

    assert_eq!(
        h.notifier.kinds(),
        vec![
            EventKind::Deposit,
            EventKind::Withdrawal,
            EventKind::TransferSent,
            EventKind::LowBalance,
            EventKind::TransferReceived,
        ]
    );
    let sent = h.notifier.sent();
    assert_eq!(sent[3].recipient, UserId(1));
    assert_eq!(sent[3].amount, dec!(500));
    assert_eq!(sent[4].recipient, UserId(2));
}

#[tokio::test]
async fn test_notification_failure_keeps_mutation() {
    let h = common::harness_with(
        common::RecordingNotifier::failing(),
        Default::default(),
    );
    let a = h.open(1).await;
    h.engine.ledger().deposit(a.id, dec!(42)).await.unwrap();

    assert_eq!(h.balance(&a).await, dec!(42));
    assert_eq!(h.notifier.kinds(), vec![EventKind::Deposit]);
}

#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let h = common::harness();
    let a = h.funded(1, dec!(100)).await;

    let mut tasks = Vec::new();
    for _ in 0..50 {
        let ledger = h.engine.ledger().clone();
        tasks.push(tokio::spawn(async move { ledger.withdraw(a.id, dec!(7)).await }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // 14 * 7 = 98; a 15th withdrawal would overdraw.
    assert_eq!(succeeded, 14);
    assert_eq!(h.balance(&a).await, dec!(2));
    assert_eq!(h.engine.ledger().transactions(a.id).await.unwrap().len(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_transfers_conserve_money() {
    let h = common::harness();
    let mut accounts = Vec::new();
    for user in 0..6 {
        accounts.push(h.funded(user, dec!(250)).await);
    }
    let total_before: Decimal = dec!(250) * Decimal::from(accounts.len());

    let mut rng = rand::thread_rng();
    let mut tasks = Vec::new();
    for _ in 0..300 {
        let from = accounts[rng.gen_range(0..accounts.len())].id;
        let to = accounts[rng.gen_range(0..accounts.len())].id;
        let amount = Decimal::new(rng.gen_range(1..=15_000), 2);
        let ledger = h.engine.ledger().clone();
        tasks.push(tokio::spawn(async move { ledger.transfer(from, to, amount).await }));
    }
    for task in tasks {
        match task.await.unwrap() {
            Ok(_)
            | Err(LedgerError::InsufficientFunds { .. })
            | Err(LedgerError::InvalidAccountId(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let mut total_after = Decimal::ZERO;
    for account in &accounts {
        let balance = h.balance(account).await;
        assert!(balance >= Decimal::ZERO);
        total_after += balance;
    }
    assert_eq!(total_after, total_before);
}
