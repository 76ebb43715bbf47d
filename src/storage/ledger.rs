use std::future::Future;

use tracing::debug;

use crate::domain::TransactionRecord;

use super::{Repository, Scope, StorageError, is_unique_violation};

/// Append-only audit log keyed by transaction id.
///
/// The unique key is the idempotency gate: appending an id that is already
/// recorded fails with `DuplicateTransaction` and must never be treated as success.
/// Records are never read back, updated or deleted through this contract.
pub trait TransactionLedger: Send + Sync {
    fn append(
        &self,
        scope: &mut Scope,
        record: &TransactionRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl TransactionLedger for Repository {
    async fn append(&self, scope: &mut Scope, record: &TransactionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO transaction_history (transaction_id, user_id, transaction_type, amount, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.transaction_id)
        .bind(record.user_id.as_deref())
        .bind(record.transaction_type.code())
        .bind(record.amount)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(scope.connection())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateTransaction(record.transaction_id.clone())
            } else {
                StorageError::Database(e)
            }
        })?;

        debug!(
            transaction_id = %record.transaction_id,
            transaction_type = %record.transaction_type,
            "ledger record appended"
        );
        Ok(())
    }
}
