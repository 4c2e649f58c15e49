//! In-memory ledger
//!
//! Mirrors the Postgres ledger closely enough to run the engine without a
//! database: per-wallet async mutexes act as row locks, writes are buffered
//! in the transaction and applied on commit, and a dropped transaction
//! discards its writes and releases its locks. Faults can be injected at
//! every step.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{NewEntry, TransactionEntry, Wallet};

use super::{LedgerStore, LedgerTx, StoreError, StoreResult};

/// Step of a ledger transaction where a fault can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    LockWallet,
    InsertWallet,
    ApplyDelta,
    WalletId,
    AppendEntry,
    Commit,
}

/// What happens when an armed fault point is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The step returns `StoreError::Unavailable`
    Error,
    /// The step panics
    Panic,
}

/// Shared in-memory ledger. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<String, Arc<RowLock<()>>>>,
    faults: Mutex<HashMap<FaultPoint, Fault>>,
    open_transactions: AtomicUsize,
}

#[derive(Default)]
struct State {
    wallets: Vec<Wallet>,
    entries: Vec<TransactionEntry>,
    /// Uuids inserted by transactions that have not finished yet
    pending_uuids: HashSet<String>,
    next_wallet_id: i64,
    next_entry_id: i64,
}

impl State {
    fn active_wallet(&self, wallet_uuid: &str) -> Option<&Wallet> {
        self.wallets
            .iter()
            .find(|w| w.uuid == wallet_uuid && !w.is_deleted())
    }

    fn active_wallet_mut(&mut self, wallet_uuid: &str) -> Option<&mut Wallet> {
        self.wallets
            .iter_mut()
            .find(|w| w.uuid == wallet_uuid && !w.is_deleted())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    fn row_lock(&self, wallet_uuid: &str) -> Arc<RowLock<()>> {
        lock(&self.row_locks)
            .entry(wallet_uuid.to_string())
            .or_default()
            .clone()
    }

    /// Fire the fault armed for `point`, if any. Faults are one-shot.
    fn trip(&self, point: FaultPoint) -> StoreResult<()> {
        let fault = lock(&self.faults).remove(&point);
        match fault {
            None => Ok(()),
            Some(Fault::Error) => Err(StoreError::Unavailable(format!(
                "injected fault at {:?}",
                point
            ))),
            Some(Fault::Panic) => panic!("injected panic at {:?}", point),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault at `point`
    pub fn inject(&self, point: FaultPoint, fault: Fault) {
        lock(&self.shared.faults).insert(point, fault);
    }

    /// Number of transactions begun and not yet committed, rolled back, or dropped
    pub fn open_transactions(&self) -> usize {
        self.shared.open_transactions.load(Ordering::SeqCst)
    }

    /// Number of wallet rows, deleted ones included
    pub fn wallet_count(&self) -> usize {
        self.shared.state().wallets.len()
    }

    /// Number of log entries across all wallets
    pub fn entry_count(&self) -> usize {
        self.shared.state().entries.len()
    }

    /// Mark a wallet deleted. Returns false when no active wallet matches.
    pub fn soft_delete(&self, wallet_uuid: &str) -> bool {
        let mut state = self.shared.state();
        match state.active_wallet_mut(wallet_uuid) {
            Some(wallet) => {
                wallet.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        self.shared.trip(FaultPoint::Begin)?;
        self.shared.open_transactions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryLedgerTx {
            shared: self.shared.clone(),
            locks: HashMap::new(),
            inserted: Vec::new(),
            deltas: Vec::new(),
            entries: Vec::new(),
        }))
    }

    async fn balance(&self, wallet_uuid: &str) -> StoreResult<Option<i64>> {
        Ok(self
            .shared
            .state()
            .active_wallet(wallet_uuid)
            .map(|w| w.balance))
    }

    async fn wallet(&self, wallet_uuid: &str) -> StoreResult<Option<Wallet>> {
        Ok(self.shared.state().active_wallet(wallet_uuid).cloned())
    }

    async fn entries(&self, wallet_id: i64) -> StoreResult<Vec<TransactionEntry>> {
        Ok(self
            .shared
            .state()
            .entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect())
    }
}

/// Open in-memory transaction
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    locks: HashMap<String, OwnedMutexGuard<()>>,
    inserted: Vec<Wallet>,
    deltas: Vec<(String, i64)>,
    entries: Vec<TransactionEntry>,
}

impl MemoryLedgerTx {
    async fn acquire(&mut self, wallet_uuid: &str) {
        if self.locks.contains_key(wallet_uuid) {
            return;
        }
        let guard = self.shared.row_lock(wallet_uuid).lock_owned().await;
        self.locks.insert(wallet_uuid.to_string(), guard);
    }

    fn pending_delta(&self, wallet_uuid: &str) -> i64 {
        self.deltas
            .iter()
            .filter(|(uuid, _)| uuid == wallet_uuid)
            .map(|(_, delta)| delta)
            .sum()
    }

    fn committed_id(&self, wallet_uuid: &str) -> Option<i64> {
        self.shared.state().active_wallet(wallet_uuid).map(|w| w.id)
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_wallet(&mut self, wallet_uuid: &str) -> StoreResult<Option<i64>> {
        self.shared.trip(FaultPoint::LockWallet)?;

        if self.committed_id(wallet_uuid).is_none() {
            return Ok(None);
        }

        self.acquire(wallet_uuid).await;

        // Re-read once the lock is held; the previous holder may have committed.
        let balance = self
            .shared
            .state()
            .active_wallet(wallet_uuid)
            .map(|w| w.balance);

        match balance {
            Some(balance) => Ok(Some(balance + self.pending_delta(wallet_uuid))),
            None => {
                self.locks.remove(wallet_uuid);
                Ok(None)
            }
        }
    }

    async fn insert_wallet(&mut self, wallet_uuid: &str, balance: i64) -> StoreResult<()> {
        self.shared.trip(FaultPoint::InsertWallet)?;

        let mut state = self.shared.state();
        if state.active_wallet(wallet_uuid).is_some() || state.pending_uuids.contains(wallet_uuid)
        {
            return Err(StoreError::UniqueViolation(wallet_uuid.to_string()));
        }

        state.pending_uuids.insert(wallet_uuid.to_string());
        state.next_wallet_id += 1;
        let now = Utc::now();
        self.inserted.push(Wallet {
            id: state.next_wallet_id,
            uuid: wallet_uuid.to_string(),
            balance,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        });

        Ok(())
    }

    async fn apply_delta(&mut self, wallet_uuid: &str, delta: i64) -> StoreResult<()> {
        self.shared.trip(FaultPoint::ApplyDelta)?;

        if let Some(wallet) = self.inserted.iter_mut().find(|w| w.uuid == wallet_uuid) {
            wallet.balance += delta;
            return Ok(());
        }

        if self.committed_id(wallet_uuid).is_none() {
            return Err(StoreError::RowMissing(format!("wallet {}", wallet_uuid)));
        }

        // An UPDATE takes the row lock itself when the caller did not.
        self.acquire(wallet_uuid).await;
        self.deltas.push((wallet_uuid.to_string(), delta));

        Ok(())
    }

    async fn wallet_id(&mut self, wallet_uuid: &str) -> StoreResult<i64> {
        self.shared.trip(FaultPoint::WalletId)?;

        self.inserted
            .iter()
            .find(|w| w.uuid == wallet_uuid)
            .map(|w| w.id)
            .or_else(|| self.committed_id(wallet_uuid))
            .ok_or_else(|| StoreError::RowMissing(format!("wallet {}", wallet_uuid)))
    }

    async fn append_entry(&mut self, entry: NewEntry) -> StoreResult<i64> {
        self.shared.trip(FaultPoint::AppendEntry)?;

        let mut state = self.shared.state();
        let known = self.inserted.iter().any(|w| w.id == entry.wallet_id)
            || state
                .wallets
                .iter()
                .any(|w| w.id == entry.wallet_id && !w.is_deleted());
        if !known {
            return Err(StoreError::RowMissing(format!(
                "wallet id {}",
                entry.wallet_id
            )));
        }

        state.next_entry_id += 1;
        let id = state.next_entry_id;
        self.entries.push(TransactionEntry {
            id,
            wallet_id: entry.wallet_id,
            operation_type: entry.operation_type,
            amount: entry.amount.value(),
            status: entry.status,
            created_at: Utc::now(),
        });

        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = self;
        this.shared.trip(FaultPoint::Commit)?;

        {
            let state = this.shared.state();
            if let Some((missing, _)) = this
                .deltas
                .iter()
                .find(|(uuid, _)| state.active_wallet(uuid).is_none())
            {
                return Err(StoreError::RowMissing(format!("wallet {}", missing)));
            }
        }

        let inserted = std::mem::take(&mut this.inserted);
        let deltas = std::mem::take(&mut this.deltas);
        let entries = std::mem::take(&mut this.entries);

        let mut state = this.shared.state();
        let now = Utc::now();
        for wallet in inserted {
            state.pending_uuids.remove(&wallet.uuid);
            state.wallets.push(wallet);
        }
        for (wallet_uuid, delta) in deltas {
            if let Some(wallet) = state.active_wallet_mut(&wallet_uuid) {
                wallet.balance += delta;
                wallet.updated_at = now;
            }
        }
        state.entries.extend(entries);

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        tracing::debug!(
            pending_wallets = self.inserted.len(),
            pending_entries = self.entries.len(),
            "Discarding in-memory transaction"
        );
        Ok(())
    }
}

impl Drop for MemoryLedgerTx {
    fn drop(&mut self) {
        if !self.inserted.is_empty() {
            let mut state = self.shared.state();
            for wallet in &self.inserted {
                state.pending_uuids.remove(&wallet.uuid);
            }
        }
        self.shared.open_transactions.fetch_sub(1, Ordering::SeqCst);
    }
}
