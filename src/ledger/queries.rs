//! SQL statements used by the Postgres ledger

pub const INSERT_WALLET: &str = r#"
    INSERT INTO wallets (uuid, balance)
    VALUES ($1, $2)
"#;

/// Row lock held until the enclosing transaction ends
pub const LOCK_WALLET: &str = r#"
    SELECT balance
    FROM wallets
    WHERE uuid = $1 AND deleted_at IS NULL
    FOR UPDATE
"#;

pub const APPLY_DELTA: &str = r#"
    UPDATE wallets
    SET balance = balance + $1, updated_at = NOW()
    WHERE uuid = $2 AND deleted_at IS NULL
"#;

pub const GET_WALLET_ID: &str = r#"
    SELECT wallet_id
    FROM wallets
    WHERE uuid = $1 AND deleted_at IS NULL
"#;

pub const INSERT_ENTRY: &str = r#"
    INSERT INTO transactions (wallet_id, operation_type, amount, status)
    VALUES ($1, $2, $3, $4)
    RETURNING transaction_id
"#;

pub const GET_BALANCE: &str = r#"
    SELECT balance
    FROM wallets
    WHERE uuid = $1 AND deleted_at IS NULL
"#;

pub const GET_WALLET: &str = r#"
    SELECT wallet_id, uuid, balance, created_at, updated_at, deleted_at
    FROM wallets
    WHERE uuid = $1 AND deleted_at IS NULL
"#;

pub const LIST_ENTRIES: &str = r#"
    SELECT transaction_id, wallet_id, operation_type, amount, status, created_at
    FROM transactions
    WHERE wallet_id = $1
    ORDER BY transaction_id ASC
"#;
