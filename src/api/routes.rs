//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OperationType, TransactionEntry};
use crate::engine::{WalletEngine, WalletOperation};
use crate::error::{AppError, AppResult};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationRequest {
    pub wallet_id: String,
    pub operation_type: OperationType,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationResponse {
    pub message: String,
    pub wallet_id: String,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub wallet_id: String,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub wallet_id: String,
    pub entries: Vec<TransactionEntry>,
}

impl WalletOperationRequest {
    /// Validate the payload into an engine command
    fn into_operation(self) -> AppResult<WalletOperation> {
        let wallet_uuid = normalize_wallet_id(&self.wallet_id)?;

        if self.amount <= 0 {
            return Err(AppError::InvalidRequest(
                "amount must be a positive integer".to_string(),
            ));
        }

        Ok(WalletOperation {
            wallet_uuid,
            operation_type: self.operation_type,
            amount: self.amount,
        })
    }
}

/// Parse a wallet id and render it in lowercase hyphenated form
pub fn normalize_wallet_id(raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| AppError::InvalidRequest(format!("invalid wallet id: {}", raw)))
}

// =========================================================================
// Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<WalletEngine> {
    Router::new()
        .route("/wallet", post(wallet_operation))
        .route("/wallets", get(missing_wallet_id))
        .route("/wallets/:wallet_uuid", get(get_balance))
        .route("/wallets/:wallet_uuid/transactions", get(get_history))
}

// =========================================================================
// POST /wallet
// =========================================================================

/// Deposit into or withdraw from a wallet
async fn wallet_operation(
    State(engine): State<WalletEngine>,
    payload: Result<Json<WalletOperationRequest>, JsonRejection>,
) -> AppResult<Json<WalletOperationResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let operation = request.into_operation()?;

    let receipt = engine.execute(operation).await?;

    let message = match receipt.operation_type {
        OperationType::Deposit => "Deposit successful",
        OperationType::Withdraw => "Withdraw successful",
    };

    Ok(Json(WalletOperationResponse {
        message: message.to_string(),
        wallet_id: receipt.wallet_uuid,
        balance: receipt.balance,
    }))
}

// =========================================================================
// GET /wallets/:wallet_uuid
// =========================================================================

async fn get_balance(
    State(engine): State<WalletEngine>,
    Path(wallet_uuid): Path<String>,
) -> AppResult<Json<BalanceResponse>> {
    let wallet_id = normalize_wallet_id(&wallet_uuid)?;
    let balance = engine.balance(&wallet_id).await?;

    Ok(Json(BalanceResponse { wallet_id, balance }))
}

/// `GET /wallets` without an id
async fn missing_wallet_id() -> AppError {
    AppError::MissingParameter("walletUUID".to_string())
}

// =========================================================================
// GET /wallets/:wallet_uuid/transactions
// =========================================================================

async fn get_history(
    State(engine): State<WalletEngine>,
    Path(wallet_uuid): Path<String>,
) -> AppResult<Json<HistoryResponse>> {
    let wallet_id = normalize_wallet_id(&wallet_uuid)?;
    let entries = engine.history(&wallet_id).await?;

    Ok(Json(HistoryResponse { wallet_id, entries }))
}
