use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::time::Instant;

use super::StorageError;

/// One atomic unit of work: a store mutation and its ledger append.
///
/// Wraps an open SQLite transaction together with the deadline it must commit by.
/// `commit` and `rollback` consume the scope, so it cannot be reused across
/// operations. Dropping a scope without committing rolls the transaction back,
/// which covers early returns and cancelled futures alike.
pub struct Scope {
    tx: Transaction<'static, Sqlite>,
    deadline: Instant,
}

impl Scope {
    pub(super) fn new(tx: Transaction<'static, Sqlite>, deadline: Instant) -> Self {
        Self { tx, deadline }
    }

    /// Instant by which the scope must be committed.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Connection bound to this scope's transaction.
    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
