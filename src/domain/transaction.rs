use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;

/// Kind of balance change an audit record stands for.
/// Stored as an integer code in `transaction_history.transaction_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Single user balance increased
    Credit,
    /// Single user balance decreased
    Debit,
    /// Every balance increased by the same amount
    BulkCredit,
}

impl TransactionType {
    pub fn code(&self) -> i64 {
        match self {
            TransactionType::Credit => 0,
            TransactionType::Debit => 1,
            TransactionType::BulkCredit => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TransactionType::Credit),
            1 => Some(TransactionType::Debit),
            2 => Some(TransactionType::BulkCredit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::BulkCredit => "bulk_credit",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit entry, written once in the same scope as its balance change.
/// The transaction id doubles as the idempotency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    /// `None` for bulk credits, which touch every account
    pub user_id: Option<String>,
    pub transaction_type: TransactionType,
    /// Always positive
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn new(
        transaction_id: impl Into<String>,
        user_id: Option<String>,
        transaction_type: TransactionType,
        amount: Amount,
    ) -> Self {
        assert!(amount > 0, "Transaction amount must be positive");
        let now = Utc::now();
        Self {
            transaction_id: transaction_id.into(),
            user_id,
            transaction_type,
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn credit(transaction_id: impl Into<String>, user_id: impl Into<String>, amount: Amount) -> Self {
        Self::new(
            transaction_id,
            Some(user_id.into()),
            TransactionType::Credit,
            amount,
        )
    }

    pub fn debit(transaction_id: impl Into<String>, user_id: impl Into<String>, amount: Amount) -> Self {
        Self::new(
            transaction_id,
            Some(user_id.into()),
            TransactionType::Debit,
            amount,
        )
    }

    pub fn bulk_credit(transaction_id: impl Into<String>, amount: Amount) -> Self {
        Self::new(transaction_id, None, TransactionType::BulkCredit, amount)
    }

    /// Signed change this record applied to each affected balance.
    pub fn signed_amount(&self) -> Amount {
        match self.transaction_type {
            TransactionType::Credit | TransactionType::BulkCredit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_stable() {
        assert_eq!(TransactionType::Credit.code(), 0);
        assert_eq!(TransactionType::Debit.code(), 1);
        assert_eq!(TransactionType::BulkCredit.code(), 2);

        for t in [
            TransactionType::Credit,
            TransactionType::Debit,
            TransactionType::BulkCredit,
        ] {
            assert_eq!(TransactionType::from_code(t.code()), Some(t));
        }
        assert_eq!(TransactionType::from_code(3), None);
        assert_eq!(TransactionType::from_code(-1), None);
    }

    #[test]
    fn test_record_constructors() {
        let credit = TransactionRecord::credit("A", "u1", 1000);
        assert_eq!(credit.user_id.as_deref(), Some("u1"));
        assert_eq!(credit.transaction_type, TransactionType::Credit);
        assert_eq!(credit.signed_amount(), 1000);

        let debit = TransactionRecord::debit("B", "u5", 600);
        assert_eq!(debit.transaction_type, TransactionType::Debit);
        assert_eq!(debit.amount, 600); // stored unsigned
        assert_eq!(debit.signed_amount(), -600);

        let bulk = TransactionRecord::bulk_credit("C", 1000);
        assert_eq!(bulk.user_id, None);
        assert_eq!(bulk.transaction_type, TransactionType::BulkCredit);
        assert_eq!(bulk.signed_amount(), 1000);
    }

    #[test]
    #[should_panic(expected = "Transaction amount must be positive")]
    fn test_record_requires_positive_amount() {
        TransactionRecord::credit("A", "u1", 0);
    }
}
