mod balance;
mod money;
mod transaction;

pub use balance::*;
pub use money::*;
pub use transaction::*;
