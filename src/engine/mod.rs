//! Wallet engine module
//!
//! Orchestrates deposits, withdrawals and balance reads over the ledger store.

mod commands;
mod wallet_engine;


pub use commands::{OperationReceipt, WalletOperation};
pub use wallet_engine::WalletEngine;
