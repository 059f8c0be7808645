//! End-to-end tests of the account and interest lifecycle

use chrono::Utc;
use ledger_core::{
    Config, Error, Ledger, NewAccount, OperationKind, Role, TransactionKind,
};
use rust_decimal::Decimal;

/// Create test ledger with temp directory
async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Ledger::open(config).await.unwrap(), temp_dir)
}

/// A month in the life of one account: deposits, a rejected withdrawal,
/// thirty daily accruals, and the monthly sweep.
#[tokio::test]
async fn test_full_interest_lifecycle() {
    let (ledger, _temp) = create_test_ledger().await;

    let account = ledger
        .register_account(NewAccount::standard("Alice", "alice@example.com", "hash"))
        .await
        .unwrap();
    let account = ledger
        .set_account_rate(account.id, Decimal::new(50, 1)) // 5.0%
        .await
        .unwrap();
    ledger
        .perform_operation(account.id, Decimal::from(1000), OperationKind::Deposit, None)
        .await
        .unwrap();

    // Thirty nightly accruals at 1000.00 and 5.0%: 0.1370 each, balance
    // untouched throughout
    for _ in 0..30 {
        let summary = ledger.run_daily_accrual(Utc::now()).await.unwrap();
        assert_eq!(summary.accounts_processed, 1);
        assert!(summary.errors.is_empty());
    }
    let account = ledger.account(account.id).unwrap();
    assert_eq!(account.balance, Decimal::from(1000));

    let entries = ledger.interest_history(account.id, usize::MAX).unwrap();
    assert_eq!(entries.len(), 30);
    for entry in &entries {
        assert_eq!(entry.amount, Decimal::new(1370, 4));
        assert!(!entry.committed);
        assert!(!entry.is_swept());
    }

    // Monthly sweep: 30 * 0.1370 = 4.1100, credited as 4.11
    let summary = ledger.run_monthly_credit(Utc::now(), 30).await.unwrap();
    assert_eq!(summary.accounts_credited, 1);
    assert_eq!(summary.total_credited, Decimal::new(411, 2));
    assert!(summary.errors.is_empty());

    let account = ledger.account(account.id).unwrap();
    assert_eq!(account.balance, Decimal::new(100411, 2));

    // The credit leaves one interest transaction snapshotting the new balance
    let transactions = ledger.transactions(account.id, usize::MAX).unwrap();
    let credit_tx = transactions
        .iter()
        .find(|tx| tx.kind == TransactionKind::Interest)
        .unwrap();
    assert_eq!(credit_tx.amount, Decimal::new(411, 2));
    assert_eq!(credit_tx.balance_after, Decimal::new(100411, 2));
    assert_eq!(credit_tx.description, "Monthly interest credit");

    // All thirty daily entries are stamped by the committed credit entry
    let entries = ledger.interest_history(account.id, usize::MAX).unwrap();
    assert_eq!(entries.len(), 31);
    let credit_entry = entries.iter().find(|e| e.committed).unwrap();
    assert_eq!(credit_entry.amount, Decimal::new(411, 2));
    for entry in entries.iter().filter(|e| !e.committed) {
        assert_eq!(entry.credited_by, Some(credit_entry.id));
    }

    // Ordinary operations keep flowing afterwards
    let (account, tx) = ledger
        .perform_operation(account.id, Decimal::from(200), OperationKind::Deposit, None)
        .await
        .unwrap();
    assert_eq!(account.balance, Decimal::new(120411, 2));
    assert_eq!(tx.balance_after, account.balance);

    let result = ledger
        .perform_operation(account.id, Decimal::from(1300), OperationKind::Withdraw, None)
        .await;
    assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
    assert_eq!(
        ledger.account(account.id).unwrap().balance,
        Decimal::new(120411, 2)
    );

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_monthly_credit_idempotent_within_window() {
    let (ledger, _temp) = create_test_ledger().await;

    let account = ledger
        .register_account(NewAccount::standard("Bob", "bob@example.com", "hash"))
        .await
        .unwrap();
    ledger
        .perform_operation(account.id, Decimal::from(1000), OperationKind::Deposit, None)
        .await
        .unwrap();
    ledger.run_daily_accrual(Utc::now()).await.unwrap();

    let first = ledger.run_monthly_credit(Utc::now(), 30).await.unwrap();
    assert_eq!(first.accounts_credited, 1);
    let balance_after_first = ledger.account(account.id).unwrap().balance;

    // Re-running inside the window finds only swept entries: no-op
    let second = ledger.run_monthly_credit(Utc::now(), 30).await.unwrap();
    assert_eq!(second.accounts_credited, 0);
    assert_eq!(second.total_credited, Decimal::ZERO);
    assert_eq!(ledger.account(account.id).unwrap().balance, balance_after_first);

    // Still exactly one interest transaction
    let interest_txs = ledger
        .transactions(account.id, usize::MAX)
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Interest)
        .count();
    assert_eq!(interest_txs, 1);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_registration_snapshots_default_rate() {
    let (ledger, _temp) = create_test_ledger().await;

    ledger.set_default_rate(Decimal::new(40, 1)).await.unwrap();
    let early = ledger
        .register_account(NewAccount::standard("Early", "early@example.com", "hash"))
        .await
        .unwrap();
    assert_eq!(early.interest_rate, Decimal::new(40, 1));

    // Raising the default later does not reprice existing accounts
    ledger.set_default_rate(Decimal::new(60, 1)).await.unwrap();
    assert_eq!(
        ledger.account(early.id).unwrap().interest_rate,
        Decimal::new(40, 1)
    );

    let late = ledger
        .register_account(NewAccount::standard("Late", "late@example.com", "hash"))
        .await
        .unwrap();
    assert_eq!(late.interest_rate, Decimal::new(60, 1));

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_cascade_is_scoped_to_one_account() {
    let (ledger, _temp) = create_test_ledger().await;

    let doomed = ledger
        .register_account(NewAccount::standard("Doomed", "doomed@example.com", "hash"))
        .await
        .unwrap();
    let survivor = ledger
        .register_account(NewAccount::standard("Survivor", "survivor@example.com", "hash"))
        .await
        .unwrap();
    for id in [doomed.id, survivor.id] {
        ledger
            .perform_operation(id, Decimal::from(500), OperationKind::Deposit, None)
            .await
            .unwrap();
    }
    ledger.run_daily_accrual(Utc::now()).await.unwrap();

    ledger.delete_account(doomed.id).await.unwrap();

    assert!(matches!(
        ledger.account(doomed.id),
        Err(Error::AccountNotFound(_))
    ));
    assert!(ledger.transactions(doomed.id, usize::MAX).unwrap().is_empty());
    assert!(ledger.interest_history(doomed.id, usize::MAX).unwrap().is_empty());

    // The other account's history is untouched
    assert_eq!(ledger.transactions(survivor.id, usize::MAX).unwrap().len(), 1);
    assert_eq!(
        ledger.interest_history(survivor.id, usize::MAX).unwrap().len(),
        1
    );

    // The freed email can be reused
    let reused = ledger
        .register_account(NewAccount::standard("Again", "doomed@example.com", "hash"))
        .await
        .unwrap();
    assert_ne!(reused.id, doomed.id);

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_admin_account_cannot_be_deleted() {
    let (ledger, _temp) = create_test_ledger().await;

    let admin = ledger
        .register_account(NewAccount {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Administrator,
            rate_override: Some(Decimal::new(50, 1)),
        })
        .await
        .unwrap();

    let result = ledger.delete_account(admin.id).await;
    assert!(matches!(result, Err(Error::AdminUndeletable(_))));
    assert!(ledger.account(admin.id).is_ok());

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_credit_skips_accounts_with_nothing_accrued() {
    let (ledger, _temp) = create_test_ledger().await;

    // Registered but never funded: no accruals exist to sweep
    let idle = ledger
        .register_account(NewAccount::standard("Idle", "idle@example.com", "hash"))
        .await
        .unwrap();

    let summary = ledger.run_monthly_credit(Utc::now(), 30).await.unwrap();
    assert_eq!(summary.accounts_credited, 0);
    assert_eq!(summary.total_credited, Decimal::ZERO);
    assert!(summary.errors.is_empty());

    assert!(ledger.transactions(idle.id, usize::MAX).unwrap().is_empty());

    ledger.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let (ledger, _temp) = create_test_ledger().await;

    ledger
        .register_account(NewAccount::standard("First", "taken@example.com", "hash"))
        .await
        .unwrap();
    let result = ledger
        .register_account(NewAccount::standard("Second", "taken@example.com", "hash"))
        .await;
    assert!(matches!(result, Err(Error::EmailTaken(_))));

    ledger.shutdown().await.unwrap();
}
