//! Domain module
//!
//! Core wallet types and the engine's error taxonomy.

pub mod amount;
pub mod error;
pub mod operation;
pub mod wallet;

pub use amount::{Amount, AmountError, Balance};
pub use error::{WalletError, WalletResult};
pub use operation::{EntryStatus, OperationType, UnknownVariant};
pub use wallet::{NewEntry, TransactionEntry, Wallet};
