use thiserror::Error;

use crate::domain::Amount;

/// Failures reported by the SQLite adapter.
/// Constraint outcomes the engine cares about get their own variants;
/// everything else stays a raw sqlx error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient balance for user {user_id} to apply {delta}")]
    InsufficientFunds { user_id: String, delta: Amount },

    #[error("Transaction already recorded: {0}")]
    DuplicateTransaction(String),

    /// The delta would push a balance past the integer range.
    /// `user_id` is `None` for bulk deltas.
    #[error("Delta {delta} would overflow a balance")]
    BalanceOverflow {
        user_id: Option<String>,
        delta: Amount,
    },

    #[error("Invalid bulk delta: {0}")]
    InvalidDelta(Amount),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// SQLite extended result codes for PRIMARY KEY and UNIQUE constraint failures.
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Whether an sqlx error is a uniqueness violation on some key.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || matches!(
                    db_err.code().as_deref(),
                    Some(SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE)
                )
        }
        _ => false,
    }
}
