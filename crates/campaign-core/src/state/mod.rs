pub mod transaction;

pub use transaction::{TransactionStateError, TransactionStore};
