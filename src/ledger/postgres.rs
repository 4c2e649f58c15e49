//! PostgreSQL ledger
//!
//! Row locks are `SELECT ... FOR UPDATE` under the default READ COMMITTED
//! isolation. The lock lives until the transaction commits or rolls back, so
//! a balance read through `lock_wallet` stays valid for the rest of the
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{EntryStatus, NewEntry, OperationType, TransactionEntry, Wallet};

use super::queries;
use super::{LedgerStore, LedgerTx, StoreError, StoreResult};

type WalletRow = (
    i64,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

type EntryRow = (i64, i64, String, i64, String, DateTime<Utc>);

/// Ledger backed by the `wallets` and `transactions` tables
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn balance(&self, wallet_uuid: &str) -> StoreResult<Option<i64>> {
        let balance: Option<i64> = sqlx::query_scalar(queries::GET_BALANCE)
            .bind(wallet_uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(balance)
    }

    async fn wallet(&self, wallet_uuid: &str) -> StoreResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(queries::GET_WALLET)
            .bind(wallet_uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, uuid, balance, created_at, updated_at, deleted_at)| Wallet {
                id,
                uuid,
                balance,
                created_at,
                updated_at,
                deleted_at,
            },
        ))
    }

    async fn entries(&self, wallet_id: i64) -> StoreResult<Vec<TransactionEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(queries::LIST_ENTRIES)
            .bind(wallet_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(
    (id, wallet_id, operation_type, amount, status, created_at): EntryRow,
) -> StoreResult<TransactionEntry> {
    let operation_type: OperationType = operation_type
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("transaction {}: {}", id, e)))?;
    let status: EntryStatus = status
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("transaction {}: {}", id, e)))?;

    Ok(TransactionEntry {
        id,
        wallet_id,
        operation_type,
        amount,
        status,
        created_at,
    })
}

/// Open Postgres transaction. Dropping it without commit rolls back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_wallet(&mut self, wallet_uuid: &str) -> StoreResult<Option<i64>> {
        tracing::debug!(wallet = %wallet_uuid, "Locking wallet row");

        let balance: Option<i64> = sqlx::query_scalar(queries::LOCK_WALLET)
            .bind(wallet_uuid)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(balance)
    }

    async fn insert_wallet(&mut self, wallet_uuid: &str, balance: i64) -> StoreResult<()> {
        sqlx::query(queries::INSERT_WALLET)
            .bind(wallet_uuid)
            .bind(balance)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_insert(e, wallet_uuid))?;

        Ok(())
    }

    async fn apply_delta(&mut self, wallet_uuid: &str, delta: i64) -> StoreResult<()> {
        let rows_affected = sqlx::query(queries::APPLY_DELTA)
            .bind(delta)
            .bind(wallet_uuid)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::RowMissing(format!("wallet {}", wallet_uuid)));
        }

        Ok(())
    }

    async fn wallet_id(&mut self, wallet_uuid: &str) -> StoreResult<i64> {
        let wallet_id: Option<i64> = sqlx::query_scalar(queries::GET_WALLET_ID)
            .bind(wallet_uuid)
            .fetch_optional(&mut *self.tx)
            .await?;

        wallet_id.ok_or_else(|| StoreError::RowMissing(format!("wallet {}", wallet_uuid)))
    }

    async fn append_entry(&mut self, entry: NewEntry) -> StoreResult<i64> {
        let entry_id: i64 = sqlx::query_scalar(queries::INSERT_ENTRY)
            .bind(entry.wallet_id)
            .bind(entry.operation_type.as_str())
            .bind(entry.amount.value())
            .bind(entry.status.as_str())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(entry_id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgLedgerTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let PgLedgerTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_row() {
        let now = Utc::now();
        let entry =
            entry_from_row((7, 3, "WITHDRAW".to_string(), 40, "ACTIVE".to_string(), now)).unwrap();

        assert_eq!(entry.id, 7);
        assert_eq!(entry.wallet_id, 3);
        assert_eq!(entry.operation_type, OperationType::Withdraw);
        assert_eq!(entry.signed_amount(), -40);
    }

    #[test]
    fn test_entry_from_row_rejects_unknown_kind() {
        let row = (1, 1, "REFUND".to_string(), 10, "ACTIVE".to_string(), Utc::now());
        assert!(matches!(entry_from_row(row), Err(StoreError::InvalidData(_))));
    }
}
