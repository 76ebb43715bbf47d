mod balance_store;
mod error;
mod ledger;
mod repository;
mod scope;

pub use balance_store::*;
pub use error::*;
pub use ledger::*;
pub use repository::*;
pub use scope::*;

/// SQL migration for the balance and transaction history tables
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
