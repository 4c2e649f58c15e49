//! Wallet and ledger entry records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, EntryStatus, OperationType};

/// Wallet row as stored by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Store-assigned surrogate key, never exposed over the API
    #[serde(skip_serializing)]
    pub id: i64,
    pub uuid: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Committed transaction log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEntry {
    pub id: i64,
    #[serde(skip_serializing)]
    pub wallet_id: i64,
    pub operation_type: OperationType,
    pub amount: i64,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionEntry {
    /// Balance contribution of this entry
    pub fn signed_amount(&self) -> i64 {
        self.operation_type.signed(self.amount)
    }
}

/// Log entry about to be appended inside a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEntry {
    pub wallet_id: i64,
    pub operation_type: OperationType,
    pub amount: Amount,
    pub status: EntryStatus,
}

impl NewEntry {
    /// Entry for a mutation the engine is about to commit
    pub fn active(wallet_id: i64, operation_type: OperationType, amount: Amount) -> Self {
        Self {
            wallet_id,
            operation_type,
            amount,
            status: EntryStatus::Active,
        }
    }
}
