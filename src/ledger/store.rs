//! Ledger store traits
//!
//! `LedgerStore` hands out transactions and serves lock-free reads.
//! `LedgerTx` is one unit of work. Dropping a `LedgerTx` without calling
//! `commit` must discard every write it made and release its row locks.

use async_trait::async_trait;

use crate::domain::{NewEntry, TransactionEntry, Wallet};

use super::StoreResult;

/// Durable wallet table plus append-only transaction log
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>>;

    /// Committed balance of a non-deleted wallet, without locking
    async fn balance(&self, wallet_uuid: &str) -> StoreResult<Option<i64>>;

    /// Committed record of a non-deleted wallet, without locking
    async fn wallet(&self, wallet_uuid: &str) -> StoreResult<Option<Wallet>>;

    /// Committed log entries of a wallet in append order
    async fn entries(&self, wallet_id: i64) -> StoreResult<Vec<TransactionEntry>>;
}

/// A single ledger transaction
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the wallet row exclusively and return its balance.
    ///
    /// Blocks while another transaction holds the lock. `None` when no
    /// non-deleted wallet matches.
    async fn lock_wallet(&mut self, wallet_uuid: &str) -> StoreResult<Option<i64>>;

    /// Insert a wallet with an opening balance
    async fn insert_wallet(&mut self, wallet_uuid: &str, balance: i64) -> StoreResult<()>;

    /// Add a signed delta to the balance and refresh `updated_at`
    async fn apply_delta(&mut self, wallet_uuid: &str, delta: i64) -> StoreResult<()>;

    /// Internal id of a wallet visible to this transaction
    async fn wallet_id(&mut self, wallet_uuid: &str) -> StoreResult<i64>;

    /// Append a log entry, returning its id
    async fn append_entry(&mut self, entry: NewEntry) -> StoreResult<i64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
