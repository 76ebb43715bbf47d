use std::fmt;

/// Balances and transaction amounts are whole integer units.
/// The sign of a change is carried by the transaction type, never by a stored amount.
pub type Amount = i64;

/// Check that an amount can be used for a credit, debit or bulk credit.
pub fn validate_amount(amount: Amount) -> Result<(), ArgumentError> {
    if amount <= 0 {
        return Err(ArgumentError::NonPositiveAmount(amount));
    }
    Ok(())
}

/// Check that an identifier (user id or transaction id) is usable.
/// Identifiers made only of whitespace are treated as empty.
pub fn validate_id(field: &'static str, value: &str) -> Result<(), ArgumentError> {
    if value.trim().is_empty() {
        return Err(ArgumentError::EmptyId(field));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    NonPositiveAmount(Amount),
    EmptyId(&'static str),
    BalanceOverflow(Amount),
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {}", amount)
            }
            ArgumentError::EmptyId(field) => write!(f, "{} is empty", field),
            ArgumentError::BalanceOverflow(amount) => {
                write!(f, "amount {} would overflow a balance", amount)
            }
        }
    }
}

impl std::error::Error for ArgumentError {}
