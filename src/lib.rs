//! Wallet Service Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;

pub use config::{Config, LogFormat};
pub use domain::{Amount, AmountError, Balance, OperationType, WalletError, WalletResult};
pub use engine::{OperationReceipt, WalletEngine, WalletOperation};
pub use error::{AppError, AppResult};
pub use ledger::{LedgerStore, MemoryLedger, PgLedger};
