//! Postgres Ledger Integration Tests
//!
//! Skipped unless DATABASE_URL points at a database.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::Span;
use wallet_service::domain::{Amount, NewEntry, OperationType};
use wallet_service::ledger::{LedgerStore, PgLedger, StoreError};
use wallet_service::{db, WalletEngine, WalletError};

mod common;

fn engine_for(pool: &PgPool) -> WalletEngine {
    WalletEngine::new(Arc::new(PgLedger::new(pool.clone())), Span::none())
}

#[tokio::test]
async fn test_schema_is_present() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };

    db::verify_connection(&pool).await.unwrap();
    assert!(db::check_schema(&pool).await.unwrap());
}

#[tokio::test]
async fn test_deposit_withdraw_and_history() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();

    let receipt = engine.deposit(&wallet, 100).await.unwrap();
    assert!(receipt.wallet_created);

    let receipt = engine.withdraw(&wallet, 30).await.unwrap();
    assert_eq!(receipt.balance, 70);
    assert_eq!(engine.balance(&wallet).await.unwrap(), 70);

    let history = engine.history(&wallet).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|e| (e.operation_type, e.amount)).collect();
    assert_eq!(
        kinds,
        vec![(OperationType::Deposit, 100), (OperationType::Withdraw, 30)]
    );
}

#[tokio::test]
async fn test_rejections_do_not_mutate() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();

    assert!(matches!(
        engine.withdraw(&wallet, 10).await,
        Err(WalletError::WalletNotFound(_))
    ));
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets WHERE uuid = $1")
        .bind(&wallet)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    engine.deposit(&wallet, 50).await.unwrap();
    assert!(matches!(
        engine.withdraw(&wallet, 51).await,
        Err(WalletError::InsufficientFunds { required: 51, available: 50 })
    ));
    assert_eq!(engine.balance(&wallet).await.unwrap(), 50);
    assert_eq!(engine.history(&wallet).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_append_rolls_back_update() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let ledger = PgLedger::new(pool.clone());
    let wallet = common::fresh_wallet();
    engine.deposit(&wallet, 100).await.unwrap();

    let mut tx = ledger.begin().await.unwrap();
    assert_eq!(tx.lock_wallet(&wallet).await.unwrap(), Some(100));
    tx.apply_delta(&wallet, -40).await.unwrap();

    // No wallet has this id, so the foreign key rejects the entry
    let bad_entry = NewEntry::active(-1, OperationType::Withdraw, Amount::new(40).unwrap());
    assert!(matches!(
        tx.append_entry(bad_entry).await,
        Err(StoreError::Database(_))
    ));
    tx.rollback().await.unwrap();

    assert_eq!(engine.balance(&wallet).await.unwrap(), 100);
    assert_eq!(engine.history(&wallet).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let ledger = PgLedger::new(pool.clone());
    let wallet = common::fresh_wallet();
    engine.deposit(&wallet, 100).await.unwrap();

    {
        let mut tx = ledger.begin().await.unwrap();
        tx.lock_wallet(&wallet).await.unwrap();
        tx.apply_delta(&wallet, 500).await.unwrap();
    }

    // The lock is released once the connection finishes the rollback
    let receipt = engine.deposit(&wallet, 1).await.unwrap();
    assert_eq!(receipt.balance, 101);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_do_not_lose_updates() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();

    sqlx::query("INSERT INTO wallets (uuid, balance) VALUES ($1, 0)")
        .bind(&wallet)
        .execute(&pool)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let wallet = wallet.clone();
            tokio::spawn(async move { engine.deposit(&wallet, 50).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(engine.balance(&wallet).await.unwrap(), 100);
    assert_eq!(engine.history(&wallet).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_overdraw() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();
    engine.deposit(&wallet, 100).await.unwrap();

    let tasks: Vec<_> = (0..15)
        .map(|_| {
            let engine = engine.clone();
            let wallet = wallet.clone();
            tokio::spawn(async move { engine.withdraw(&wallet, 10).await })
        })
        .collect();

    let mut approved = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => approved += 1,
            Err(WalletError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(approved, 10);
    assert_eq!(engine.balance(&wallet).await.unwrap(), 0);

    let history = engine.history(&wallet).await.unwrap();
    assert_eq!(history.len(), 11);
    assert_eq!(history.iter().map(|e| e.signed_amount()).sum::<i64>(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_deposits_keep_one_wallet() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let wallet = wallet.clone();
            tokio::spawn(async move { engine.deposit(&wallet, 25).await })
        })
        .collect();

    let mut committed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => committed += 1,
            Err(WalletError::Store(StoreError::UniqueViolation(_))) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert!(committed >= 1);
    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM wallets WHERE uuid = $1 AND deleted_at IS NULL")
            .bind(&wallet)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(engine.balance(&wallet).await.unwrap(), 25 * committed);
}

#[tokio::test]
async fn test_soft_deleted_wallet_is_replaced_on_deposit() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let engine = engine_for(&pool);
    let wallet = common::fresh_wallet();
    engine.deposit(&wallet, 100).await.unwrap();

    sqlx::query("UPDATE wallets SET deleted_at = NOW() WHERE uuid = $1")
        .bind(&wallet)
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        engine.balance(&wallet).await,
        Err(WalletError::WalletNotFound(_))
    ));

    let receipt = engine.deposit(&wallet, 5).await.unwrap();
    assert!(receipt.wallet_created);
    assert_eq!(engine.balance(&wallet).await.unwrap(), 5);
    assert_eq!(engine.history(&wallet).await.unwrap().len(), 1);
}
