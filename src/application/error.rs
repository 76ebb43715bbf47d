use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{Amount, ArgumentError};
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds for user {user_id}: cannot debit {amount}")]
    InsufficientFunds { user_id: String, amount: Amount },

    #[error("Transaction already processed: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    #[error("Scope did not commit within {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Stable classification of [`EngineError`], for transports that map errors to
/// status codes without looking at messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InsufficientFunds,
    Conflict,
    InvalidArgument,
    Database,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Database => "database_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::Timeout(_) | EngineError::Database(_) => ErrorKind::Database,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserNotFound(user_id) => EngineError::NotFound(user_id),
            StorageError::InsufficientFunds { user_id, delta } => EngineError::InsufficientFunds {
                user_id,
                amount: delta.saturating_neg(),
            },
            StorageError::DuplicateTransaction(transaction_id) => {
                EngineError::Conflict(transaction_id)
            }
            StorageError::BalanceOverflow { delta, .. } => {
                EngineError::InvalidArgument(ArgumentError::BalanceOverflow(delta))
            }
            StorageError::InvalidDelta(delta) => {
                EngineError::InvalidArgument(ArgumentError::NonPositiveAmount(delta))
            }
            other @ (StorageError::Corrupt(_) | StorageError::Database(_)) => {
                EngineError::Database(anyhow::Error::new(other))
            }
        }
    }
}
