//! Command definitions
//!
//! A wallet operation as received from a caller, and the receipt returned
//! once it has committed.

use serde::{Deserialize, Serialize};

use crate::domain::OperationType;

/// Request to move funds into or out of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOperation {
    pub wallet_uuid: String,
    pub operation_type: OperationType,
    /// Minor units; re-validated by the engine
    pub amount: i64,
}

impl WalletOperation {
    pub fn deposit(wallet_uuid: impl Into<String>, amount: i64) -> Self {
        Self {
            wallet_uuid: wallet_uuid.into(),
            operation_type: OperationType::Deposit,
            amount,
        }
    }

    pub fn withdraw(wallet_uuid: impl Into<String>, amount: i64) -> Self {
        Self {
            wallet_uuid: wallet_uuid.into(),
            operation_type: OperationType::Withdraw,
            amount,
        }
    }
}

/// Result of a committed deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub wallet_uuid: String,
    pub operation_type: OperationType,
    pub amount: i64,
    /// Balance right after this operation committed
    pub balance: i64,
    /// Id of the log entry written for this operation
    pub entry_id: i64,
    /// True when this deposit created the wallet
    pub wallet_created: bool,
}
