use axum::{
    extract::{Path, State},
    Json,
};
use banksampah_core::{BalanceAccount, LedgerEntry, StockLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    handlers::{number, required},
    ApiError, ApiJson, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveStockRequest {
    pub waste_type_id: Option<String>,
    pub amount: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveStockResponse {
    pub message: String,
    pub stock: StockLevel,
}

pub async fn list_balances(State(state): State<AppState>) -> ApiResult<Json<Vec<BalanceAccount>>> {
    Ok(Json(state.store.list_balances().await?))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<BalanceAccount>> {
    state
        .store
        .get_balance(name.trim())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No balance found for {}.", name.trim())))
}

/// Deposits and withdrawals of one depositor, oldest first.
pub async fn balance_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let name = name.trim();
    if state.store.get_balance(name).await?.is_none() {
        return Err(ApiError::not_found(format!("No balance found for {name}.")));
    }
    Ok(Json(state.store.ledger_history(name).await?))
}

pub async fn list_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<StockLevel>>> {
    Ok(Json(state.store.list_stock().await?))
}

pub async fn remove_stock(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RemoveStockRequest>,
) -> ApiResult<Json<RemoveStockResponse>> {
    let (Some(waste_type_id), Some(amount)) = (required(&req.waste_type_id), req.amount) else {
        return Err(ApiError::validation("Both waste type ID and amount are required."));
    };
    let amount = number(&amount)
        .filter(|kg| *kg > 0.0)
        .ok_or_else(|| ApiError::validation("Invalid stock amount."))?;

    let stock = state.store.remove_stock(&waste_type_id, amount).await?;
    info!(
        waste_type_id = %stock.waste_type_id,
        removed_kg = amount,
        remaining_kg = stock.quantity_kg,
        "Stock removed"
    );

    Ok(Json(RemoveStockResponse {
        message: "Stock removed successfully".to_string(),
        stock,
    }))
}
