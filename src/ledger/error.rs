//! Ledger Store Errors

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-deleted wallet with this uuid already exists or is being inserted
    #[error("Wallet already exists: {0}")]
    UniqueViolation(String),

    /// A row the transaction expected to see was not there
    #[error("Row missing inside transaction: {0}")]
    RowMissing(String),

    /// Stored data does not map onto domain types
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Backend refused the operation
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Map a sqlx error raised by an INSERT, surfacing unique-key conflicts
    pub(crate) fn from_insert(err: sqlx::Error, key: &str) -> Self {
        let unique = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");

        if unique {
            StoreError::UniqueViolation(key.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

/// Result type for ledger store operations
pub type StoreResult<T> = Result<T, StoreError>;
