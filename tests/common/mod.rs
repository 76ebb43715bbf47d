// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use balance_ledger::application::LedgerCoordinator;
use balance_ledger::config::EngineConfig;
use balance_ledger::domain::Amount;
use balance_ledger::storage::Repository;
use tempfile::TempDir;

/// Balances every seeded database starts with.
pub const SEED_BALANCES: [(&str, Amount); 5] = [
    ("test_user1", 10000),
    ("test_user2", 20000),
    ("test_user3", 30000),
    ("test_user4", 40000),
    ("test_user5", 50000),
];

/// Config pointing at a fresh database file inside `temp_dir`.
pub fn test_config(temp_dir: &TempDir) -> EngineConfig {
    EngineConfig::new(temp_dir.path().join("test.db"))
}

/// Helper to create a coordinator over an empty temporary database
pub async fn test_coordinator() -> Result<(LedgerCoordinator, TempDir)> {
    let temp_dir = TempDir::new()?;
    let coordinator = LedgerCoordinator::init(&test_config(&temp_dir)).await?;
    Ok((coordinator, temp_dir))
}

/// Helper to create a coordinator over a database seeded with `SEED_BALANCES`
pub async fn seeded_coordinator() -> Result<(LedgerCoordinator, TempDir)> {
    let (coordinator, temp_dir) = test_coordinator().await?;
    seed_users(coordinator.repository()).await?;
    Ok((coordinator, temp_dir))
}

/// Same as `seeded_coordinator`, with a custom scope deadline.
pub async fn seeded_coordinator_with_timeout(
    scope_timeout: Duration,
) -> Result<(LedgerCoordinator, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir).with_scope_timeout(scope_timeout);
    let coordinator = LedgerCoordinator::init(&config).await?;
    seed_users(coordinator.repository()).await?;
    Ok((coordinator, temp_dir))
}

/// Provision the standard five users.
pub async fn seed_users(repo: &Repository) -> Result<()> {
    for (user_id, balance) in SEED_BALANCES {
        repo.create_user(user_id, balance).await?;
    }
    Ok(())
}

/// Read a balance straight from the repository, bypassing the coordinator.
pub async fn balance_of(repo: &Repository, user_id: &str) -> Result<Amount> {
    let balances = repo.list_balances().await?;
    balances
        .into_iter()
        .find(|b| b.user_id == user_id)
        .map(|b| b.balance)
        .ok_or_else(|| anyhow::anyhow!("no balance row for {}", user_id))
}
