//! Wallet Transaction Engine
//!
//! Every mutation follows the same shape: begin a ledger transaction, lock
//! the wallet row, check preconditions against the locked balance, write the
//! new balance and one log entry, then commit. Any failure rolls back
//! explicitly; a panic or a dropped future rolls back when the transaction
//! handle is dropped.

use std::sync::Arc;

use tracing::{Instrument, Span};

use crate::domain::{
    Amount, Balance, NewEntry, OperationType, TransactionEntry, WalletError, WalletResult,
};
use crate::ledger::{LedgerStore, LedgerTx, StoreError};

use super::{OperationReceipt, WalletOperation};

/// Deposit / withdraw / balance over a ledger store
#[derive(Clone)]
pub struct WalletEngine {
    store: Arc<dyn LedgerStore>,
    span: Span,
}

impl WalletEngine {
    /// Build an engine over `store`. Operation spans are children of `span`.
    pub fn new(store: Arc<dyn LedgerStore>, span: Span) -> Self {
        Self { store, span }
    }

    /// Dispatch an operation by kind
    pub async fn execute(&self, operation: WalletOperation) -> WalletResult<OperationReceipt> {
        match operation.operation_type {
            OperationType::Deposit => self.deposit(&operation.wallet_uuid, operation.amount).await,
            OperationType::Withdraw => {
                self.withdraw(&operation.wallet_uuid, operation.amount).await
            }
        }
    }

    /// Credit a wallet, creating it when no wallet has this uuid yet
    pub async fn deposit(
        &self,
        wallet_uuid: &str,
        amount: i64,
    ) -> WalletResult<OperationReceipt> {
        let span =
            tracing::info_span!(parent: &self.span, "deposit", wallet = %wallet_uuid, amount);

        async {
            let amount = Amount::new(amount)?;
            let mut tx = self.store.begin().await?;
            let outcome = deposit_locked(&mut *tx, wallet_uuid, amount).await;
            finish(tx, outcome).await
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| log_failure(e)))
    }

    /// Debit an existing wallet if its locked balance covers `amount`
    pub async fn withdraw(
        &self,
        wallet_uuid: &str,
        amount: i64,
    ) -> WalletResult<OperationReceipt> {
        let span =
            tracing::info_span!(parent: &self.span, "withdraw", wallet = %wallet_uuid, amount);

        async {
            let amount = Amount::new(amount)?;
            let mut tx = self.store.begin().await?;
            let outcome = withdraw_locked(&mut *tx, wallet_uuid, amount).await;
            finish(tx, outcome).await
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| log_failure(e)))
    }

    /// Committed balance; takes no lock
    pub async fn balance(&self, wallet_uuid: &str) -> WalletResult<i64> {
        let span = tracing::info_span!(parent: &self.span, "balance", wallet = %wallet_uuid);

        async {
            let balance = self
                .store
                .balance(wallet_uuid)
                .await?
                .ok_or_else(|| WalletError::wallet_not_found(wallet_uuid))?;

            tracing::debug!(balance, "Balance read");
            Ok::<_, WalletError>(balance)
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| log_failure(e)))
    }

    /// Committed log entries of a wallet in append order
    pub async fn history(&self, wallet_uuid: &str) -> WalletResult<Vec<TransactionEntry>> {
        let span = tracing::info_span!(parent: &self.span, "history", wallet = %wallet_uuid);

        async {
            let wallet = self
                .store
                .wallet(wallet_uuid)
                .await?
                .ok_or_else(|| WalletError::wallet_not_found(wallet_uuid))?;

            let entries = self.store.entries(wallet.id).await?;
            tracing::debug!(entries = entries.len(), "History read");
            Ok::<_, WalletError>(entries)
        }
        .instrument(span.clone())
        .await
        .inspect_err(|e| span.in_scope(|| log_failure(e)))
    }
}

async fn deposit_locked(
    tx: &mut dyn LedgerTx,
    wallet_uuid: &str,
    amount: Amount,
) -> WalletResult<OperationReceipt> {
    let (balance, wallet_created) = match tx.lock_wallet(wallet_uuid).await? {
        None => {
            tracing::info!("Wallet not found, creating it with the initial deposit");
            tx.insert_wallet(wallet_uuid, amount.value()).await?;
            (Balance::zero().credit(&amount)?, true)
        }
        Some(current) => {
            let new_balance = stored_balance(wallet_uuid, current)?.credit(&amount)?;
            tx.apply_delta(wallet_uuid, amount.value()).await?;
            (new_balance, false)
        }
    };

    let wallet_id = tx.wallet_id(wallet_uuid).await?;
    let entry_id = tx
        .append_entry(NewEntry::active(wallet_id, OperationType::Deposit, amount))
        .await?;

    Ok(OperationReceipt {
        wallet_uuid: wallet_uuid.to_string(),
        operation_type: OperationType::Deposit,
        amount: amount.value(),
        balance: balance.value(),
        entry_id,
        wallet_created,
    })
}

async fn withdraw_locked(
    tx: &mut dyn LedgerTx,
    wallet_uuid: &str,
    amount: Amount,
) -> WalletResult<OperationReceipt> {
    let current = tx
        .lock_wallet(wallet_uuid)
        .await?
        .ok_or_else(|| WalletError::wallet_not_found(wallet_uuid))?;
    let current = stored_balance(wallet_uuid, current)?;

    if !current.is_sufficient_for(&amount) {
        return Err(WalletError::insufficient_funds(
            amount.value(),
            current.value(),
        ));
    }
    let balance = current.debit(&amount)?;

    tx.apply_delta(wallet_uuid, OperationType::Withdraw.signed(amount.value()))
        .await?;
    let wallet_id = tx.wallet_id(wallet_uuid).await?;
    let entry_id = tx
        .append_entry(NewEntry::active(wallet_id, OperationType::Withdraw, amount))
        .await?;

    Ok(OperationReceipt {
        wallet_uuid: wallet_uuid.to_string(),
        operation_type: OperationType::Withdraw,
        amount: amount.value(),
        balance: balance.value(),
        entry_id,
        wallet_created: false,
    })
}

/// A negative stored balance means the table was written outside the engine
fn stored_balance(wallet_uuid: &str, value: i64) -> Result<Balance, StoreError> {
    Balance::new(value)
        .map_err(|e| StoreError::InvalidData(format!("wallet {}: {}", wallet_uuid, e)))
}

/// Commit on success, roll back otherwise
async fn finish<T>(tx: Box<dyn LedgerTx>, outcome: WalletResult<T>) -> WalletResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            tracing::info!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => tracing::debug!("Transaction rolled back"),
                Err(rollback_err) => tracing::error!(error = %rollback_err, "Rollback failed"),
            }
            Err(err)
        }
    }
}

fn log_failure(err: &WalletError) {
    if err.is_internal() {
        tracing::error!(error = %err, "Wallet operation failed");
    } else {
        tracing::warn!(error = %err, "Wallet operation rejected");
    }
}
