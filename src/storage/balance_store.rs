use std::future::Future;

use chrono::Utc;
use tracing::debug;

use crate::domain::{Amount, UserBalance};

use super::{Repository, Scope, StorageError};

/// Durable `user_id -> balance` mapping with race-free conditional deltas.
pub trait BalanceStore: Send + Sync {
    /// Read the current balance row, outside any scope.
    fn get(&self, user_id: &str) -> impl Future<Output = Result<UserBalance, StorageError>> + Send;

    /// Add `delta` (negative for debits) to one user's balance inside `scope`.
    ///
    /// Must be a single conditional write: the row changes only if it exists and
    /// the result stays a non-negative integer. Fails with `UserNotFound`,
    /// `InsufficientFunds` or `BalanceOverflow` when nothing was updated.
    fn apply_delta(
        &self,
        scope: &mut Scope,
        user_id: &str,
        delta: Amount,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Add a non-negative `delta` to every balance in one statement.
    /// Fails with `BalanceOverflow`, leaving the scope to roll back, if any
    /// balance would leave the integer range. Returns how many rows were credited.
    fn apply_bulk_delta(
        &self,
        scope: &mut Scope,
        delta: Amount,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;
}

impl BalanceStore for Repository {
    async fn get(&self, user_id: &str) -> Result<UserBalance, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM user_balance
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_user_balance(&row),
            None => Err(StorageError::UserNotFound(user_id.to_string())),
        }
    }

    async fn apply_delta(
        &self,
        scope: &mut Scope,
        user_id: &str,
        delta: Amount,
    ) -> Result<(), StorageError> {
        // Existence, sufficiency and integer range are all decided by this one statement.
        let result = sqlx::query(
            r#"
            UPDATE user_balance
            SET balance = balance + ?, updated_at = ?
            WHERE user_id = ? AND balance + ? >= 0 AND typeof(balance + ?) = 'integer'
            "#,
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .bind(delta)
        .bind(delta)
        .execute(scope.connection())
        .await?;

        match result.rows_affected() {
            1 => {
                debug!(user_id, delta, "balance delta applied");
                Ok(())
            }
            0 => {
                // Nothing matched; tell a missing row apart from a refused debit.
                let exists = sqlx::query("SELECT 1 FROM user_balance WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_optional(scope.connection())
                    .await?
                    .is_some();

                // A negative delta on a non-negative balance cannot overflow.
                if exists && delta > 0 {
                    Err(StorageError::BalanceOverflow {
                        user_id: Some(user_id.to_string()),
                        delta,
                    })
                } else if exists {
                    Err(StorageError::InsufficientFunds {
                        user_id: user_id.to_string(),
                        delta,
                    })
                } else {
                    Err(StorageError::UserNotFound(user_id.to_string()))
                }
            }
            n => Err(StorageError::Corrupt(format!(
                "{} rows updated for user {}",
                n, user_id
            ))),
        }
    }

    async fn apply_bulk_delta(&self, scope: &mut Scope, delta: Amount) -> Result<u64, StorageError> {
        if delta < 0 {
            return Err(StorageError::InvalidDelta(delta));
        }

        // SQLite silently turns an overflowing integer sum into a REAL, so rows
        // that would overflow are skipped here and detected by the count below.
        let result = sqlx::query(
            r#"
            UPDATE user_balance
            SET balance = balance + ?, updated_at = ?
            WHERE typeof(balance + ?) = 'integer'
            "#,
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(delta)
        .execute(scope.connection())
        .await?;

        let credited = result.rows_affected();
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_balance")
            .fetch_one(scope.connection())
            .await?;
        if credited != total as u64 {
            return Err(StorageError::BalanceOverflow {
                user_id: None,
                delta,
            });
        }

        debug!(delta, credited, "bulk delta applied");
        Ok(credited)
    }
}
