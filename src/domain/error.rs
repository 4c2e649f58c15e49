//! Wallet Error Types
//!
//! The outcome taxonomy of the wallet engine. Client-correctable outcomes are
//! kept apart from internal failures so the HTTP layer can answer differently.

use thiserror::Error;

use super::AmountError;
use crate::ledger::StoreError;

/// Errors returned by deposit, withdraw, and balance reads
#[derive(Debug, Error)]
pub enum WalletError {
    /// No non-deleted wallet matches the uuid
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Locked balance is below the requested withdrawal
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Amount failed validation or the resulting balance is out of range
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Store failure: begin, statement, lock, constraint, or commit
    #[error("Internal error: {0}")]
    Store(#[from] StoreError),
}

impl WalletError {
    pub fn wallet_not_found(wallet_uuid: impl Into<String>) -> Self {
        Self::WalletNotFound(wallet_uuid.into())
    }

    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if the caller can correct this by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::WalletNotFound(_) | Self::InsufficientFunds { .. } | Self::InvalidAmount(_)
        )
    }

    /// Check if this is an internal failure
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
