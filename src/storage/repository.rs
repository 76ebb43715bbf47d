use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::time::Instant;
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Amount, TransactionRecord, TransactionType, UserBalance};

use super::{MIGRATION_001_INITIAL, Scope, StorageError, is_unique_violation};

/// The SQLite storage adapter.
///
/// Implements both [`BalanceStore`](super::BalanceStore) and
/// [`TransactionLedger`](super::TransactionLedger), opens [`Scope`]s, and offers
/// provisioning plus read-only audit queries that sit outside the engine's contracts.
/// Cloning is cheap and shares the underlying pool.
#[derive(Debug, Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing database.
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        Self::open(config, false).await
    }

    /// Initialize a new database (create if missing + migrate).
    pub async fn init(config: &EngineConfig) -> Result<Self> {
        let repo = Self::open(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(config: &EngineConfig, create_if_missing: bool) -> Result<Self> {
        // Concurrent scopes wait on the write lock for up to busy_timeout.
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.scope_timeout.max(Duration::from_secs(1)))
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to database {}",
                    config.database_path.display()
                )
            })?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Open a new atomic scope that must commit by `deadline`.
    /// Time spent waiting for a pooled connection counts against the deadline.
    pub async fn begin_scope(&self, deadline: Instant) -> Result<Scope, StorageError> {
        let tx = self.pool.begin().await?;
        debug!(
            remaining_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "scope opened"
        );
        Ok(Scope::new(tx, deadline))
    }

    // ========================
    // Provisioning
    // ========================

    /// Provision a balance row. Writes no ledger record.
    pub async fn create_user(&self, user_id: &str, initial_balance: Amount) -> Result<UserBalance> {
        if user_id.trim().is_empty() {
            anyhow::bail!("user_id is empty");
        }
        if initial_balance < 0 {
            anyhow::bail!("Initial balance cannot be negative: {}", initial_balance);
        }

        let user = UserBalance::new(user_id, initial_balance);
        sqlx::query(
            r#"
            INSERT INTO user_balance (user_id, balance, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.user_id)
        .bind(user.balance)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                anyhow::anyhow!("User already exists: {}", user_id)
            } else {
                anyhow::Error::new(e).context("Failed to create user")
            }
        })?;

        Ok(user)
    }

    // ========================
    // Inspection
    // ========================

    /// List every balance row, ordered by user id.
    pub async fn list_balances(&self) -> Result<Vec<UserBalance>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM user_balance
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        rows.iter()
            .map(|row| Self::row_to_user_balance(row).map_err(anyhow::Error::from))
            .collect()
    }

    /// Get an audit record by its transaction id.
    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, user_id, transaction_type, amount, created_at, updated_at
            FROM transaction_history
            WHERE transaction_id = ?
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// List audit records, most recently written first.
    ///
    /// With a `user_id` only that user's credits and debits are returned;
    /// bulk credits have no user and only show up in the unfiltered listing.
    pub async fn list_transactions(
        &self,
        user_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let mut query = String::from(
            "SELECT transaction_id, user_id, transaction_type, amount, created_at, updated_at FROM transaction_history",
        );

        if user_id.is_some() {
            query.push_str(" WHERE user_id = ?");
        }

        query.push_str(" ORDER BY rowid DESC");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(uid) = user_id {
            sql_query = sql_query.bind(uid);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter()
            .map(|row| Self::row_to_record(row).map_err(anyhow::Error::from))
            .collect()
    }

    /// Count audit records.
    pub async fn count_transactions(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transaction_history")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .get("count");
        Ok(count)
    }

    // ========================
    // Row mapping
    // ========================

    pub(super) fn row_to_user_balance(row: &SqliteRow) -> Result<UserBalance, StorageError> {
        let created_at_str: String = row.try_get("created_at")?;
        let updated_at_str: String = row.try_get("updated_at")?;

        Ok(UserBalance {
            user_id: row.try_get("user_id")?,
            balance: row.try_get("balance")?,
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<TransactionRecord, StorageError> {
        let code: i64 = row.try_get("transaction_type")?;
        let created_at_str: String = row.try_get("created_at")?;
        let updated_at_str: String = row.try_get("updated_at")?;

        Ok(TransactionRecord {
            transaction_id: row.try_get("transaction_id")?,
            user_id: row.try_get("user_id")?,
            transaction_type: TransactionType::from_code(code)
                .ok_or_else(|| StorageError::Corrupt(format!("Invalid transaction type: {}", code)))?,
            amount: row.try_get("amount")?,
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("Invalid timestamp '{}': {}", value, e)))
}
