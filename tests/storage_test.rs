mod common;

use std::time::Duration;

use anyhow::Result;
use balance_ledger::domain::{TransactionRecord, TransactionType};
use balance_ledger::storage::{BalanceStore, Repository, StorageError, TransactionLedger};
use common::{balance_of, seed_users, test_config};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tempfile::TempDir;
use tokio::time::Instant;

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(3)
}

async fn seeded_repo() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let repo = Repository::init(&test_config(&temp_dir)).await?;
    seed_users(&repo).await?;
    Ok((repo, temp_dir))
}

#[tokio::test]
async fn test_get_existing_and_missing_users() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let user = repo.get("test_user3").await?;
    assert_eq!(user.user_id, "test_user3");
    assert_eq!(user.balance, 30000);

    assert!(matches!(
        repo.get("unknown").await,
        Err(StorageError::UserNotFound(ref id)) if id == "unknown"
    ));

    Ok(())
}

#[tokio::test]
async fn test_apply_delta_commits() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    repo.apply_delta(&mut scope, "test_user1", 1000).await?;
    repo.apply_delta(&mut scope, "test_user5", -10000).await?;
    scope.commit().await?;

    assert_eq!(balance_of(&repo, "test_user1").await?, 11000);
    assert_eq!(balance_of(&repo, "test_user5").await?, 40000);

    Ok(())
}

#[tokio::test]
async fn test_apply_delta_classifies_failures() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;

    let err = repo
        .apply_delta(&mut scope, "test_user5", -60000)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::InsufficientFunds { ref user_id, delta: -60000 } if user_id == "test_user5"
    ));

    let err = repo.apply_delta(&mut scope, "unknown", 1000).await.unwrap_err();
    assert!(matches!(err, StorageError::UserNotFound(_)));

    let err = repo
        .apply_delta(&mut scope, "'; DROP TABLE user_balance;'", -1)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UserNotFound(_)));

    scope.rollback().await?;
    assert_eq!(balance_of(&repo, "test_user5").await?, 50000);

    Ok(())
}

#[tokio::test]
async fn test_dropped_scope_rolls_back() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    {
        let mut scope = repo.begin_scope(deadline()).await?;
        repo.apply_delta(&mut scope, "test_user1", 5000).await?;
        repo.append(&mut scope, &TransactionRecord::credit("dropped", "test_user1", 5000))
            .await?;
        // no commit
    }

    assert_eq!(balance_of(&repo, "test_user1").await?, 10000);
    assert!(repo.get_transaction("dropped").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_apply_bulk_delta() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    let credited = repo.apply_bulk_delta(&mut scope, 1000).await?;
    scope.commit().await?;

    assert_eq!(credited, 5);
    let balances: Vec<i64> = repo
        .list_balances()
        .await?
        .into_iter()
        .map(|b| b.balance)
        .collect();
    assert_eq!(balances, vec![11000, 21000, 31000, 41000, 51000]);

    let mut scope = repo.begin_scope(deadline()).await?;
    assert!(matches!(
        repo.apply_bulk_delta(&mut scope, -1).await,
        Err(StorageError::InvalidDelta(-1))
    ));

    Ok(())
}

#[tokio::test]
async fn test_apply_delta_refuses_integer_overflow() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    let err = repo
        .apply_delta(&mut scope, "test_user1", i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::BalanceOverflow { ref user_id, delta: i64::MAX }
            if user_id.as_deref() == Some("test_user1")
    ));

    // Filling up to the last representable value is fine
    repo.apply_delta(&mut scope, "test_user1", i64::MAX - 10000).await?;
    scope.commit().await?;

    assert_eq!(repo.get("test_user1").await?.balance, i64::MAX);

    Ok(())
}

#[tokio::test]
async fn test_apply_bulk_delta_refuses_integer_overflow() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    assert!(matches!(
        repo.apply_bulk_delta(&mut scope, i64::MAX - 5).await,
        Err(StorageError::BalanceOverflow { user_id: None, .. })
    ));
    drop(scope);

    for balance in repo.list_balances().await? {
        assert!(balance.balance <= 50000, "{}", balance.user_id);
    }

    Ok(())
}

#[tokio::test]
async fn test_schema_rejects_non_integer_balances() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let repo = Repository::init(&config).await?;
    seed_users(&repo).await?;

    let raw = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&config.database_path))
        .await?;
    let result = sqlx::query("UPDATE user_balance SET balance = 1.5 WHERE user_id = 'test_user1'")
        .execute(&raw)
        .await;
    assert!(result.is_err());
    raw.close().await;

    assert_eq!(repo.get("test_user1").await?.balance, 10000);

    Ok(())
}

#[tokio::test]
async fn test_append_rejects_duplicate_ids() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    repo.append(&mut scope, &TransactionRecord::bulk_credit("b8eb7ccc", 10000))
        .await?;
    scope.commit().await?;

    let mut scope = repo.begin_scope(deadline()).await?;
    let err = repo
        .append(&mut scope, &TransactionRecord::debit("b8eb7ccc", "test_user5", 10000))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateTransaction(ref tid) if tid == "b8eb7ccc"));
    drop(scope);

    let record = repo.get_transaction("b8eb7ccc").await?.expect("first record");
    assert_eq!(record.transaction_type, TransactionType::BulkCredit);
    assert_eq!(record.user_id, None);

    Ok(())
}

#[tokio::test]
async fn test_create_user_rules() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let user = repo.create_user("new_user", 0).await?;
    assert_eq!(user.balance, 0);
    assert_eq!(repo.get("new_user").await?.balance, 0);

    assert!(repo.create_user("test_user1", 100).await.is_err());
    assert!(repo.create_user("negative", -1).await.is_err());
    assert!(repo.create_user("", 100).await.is_err());

    // Provisioning writes no ledger record
    assert_eq!(repo.count_transactions().await?, 0);
    assert_eq!(balance_of(&repo, "test_user1").await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_list_transactions_filters_and_limits() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let records = [
        TransactionRecord::credit("t1", "test_user1", 100),
        TransactionRecord::debit("t2", "test_user1", 50),
        TransactionRecord::credit("t3", "test_user2", 70),
        TransactionRecord::bulk_credit("t4", 10),
    ];
    let mut scope = repo.begin_scope(deadline()).await?;
    for record in &records {
        repo.append(&mut scope, record).await?;
    }
    scope.commit().await?;

    let all = repo.list_transactions(None, None).await?;
    let ids: Vec<&str> = all.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(ids, vec!["t4", "t3", "t2", "t1"]);

    let user1 = repo.list_transactions(Some("test_user1"), None).await?;
    assert_eq!(user1.len(), 2);
    assert!(user1.iter().all(|r| r.user_id.as_deref() == Some("test_user1")));

    let limited = repo.list_transactions(None, Some(1)).await?;
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].transaction_id, "t4");

    Ok(())
}

#[tokio::test]
async fn test_connect_reopens_existing_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);

    let repo = Repository::init(&config).await?;
    seed_users(&repo).await?;
    repo.close().await;

    let reopened = Repository::connect(&config).await?;
    assert_eq!(reopened.get("test_user4").await?.balance, 40000);

    // Migrations are idempotent
    reopened.migrate().await?;
    assert_eq!(reopened.list_balances().await?.len(), 5);

    Ok(())
}

#[tokio::test]
async fn test_connect_to_missing_database_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);

    assert!(Repository::connect(&config).await.is_err());

    Ok(())
}
