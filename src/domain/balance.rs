use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;

/// One account's balance row.
/// Rows are provisioned out-of-band and only ever mutated through the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: String,
    /// Never negative in any committed state
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful mutation
    pub updated_at: DateTime<Utc>,
}

impl UserBalance {
    /// Create a balance row as provisioning would. Panics on a negative balance.
    pub fn new(user_id: impl Into<String>, balance: Amount) -> Self {
        assert!(balance >= 0, "Initial balance cannot be negative");
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_balance() {
        let user = UserBalance::new("test_user1", 10000);
        assert_eq!(user.user_id, "test_user1");
        assert_eq!(user.balance, 10000);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    #[should_panic(expected = "Initial balance cannot be negative")]
    fn test_negative_initial_balance_panics() {
        UserBalance::new("test_user1", -1);
    }
}
