use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use banksampah_core::{
    DepositDraft, DepositEntry, DepositTransaction, Receipt, TransactionFilter, Withdrawal,
    WithdrawalDraft,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    handlers::{number, parse_date, required, send_receipt},
    metrics, ApiError, ApiJson, ApiResult, AppState,
};

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
const DEPOSIT_FIELDS_REQUIRED: &str = "Name, date, and at least one deposit entry are required.";

/// Entries stay loosely typed so a bad entry is reported as such rather than
/// as a body-level decode failure.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub name: Option<String>,
    pub date: Option<String>,
    pub deposits: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub message: String,
    pub transaction_id: String,
    pub total_balance: i64,
    pub balance: i64,
    pub replayed: bool,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub name: Option<String>,
    pub date: Option<String>,
    pub amount: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub message: String,
    pub withdrawal_id: String,
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransactionSearch {
    pub name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn deposit_entry(entry: &Value) -> ApiResult<DepositEntry> {
    let waste_type_id = entry
        .get("wasteTypeId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let amount = entry.get("amount").and_then(number);
    match (waste_type_id, amount) {
        (Some(waste_type_id), Some(amount)) => Ok(DepositEntry {
            waste_type_id: waste_type_id.to_string(),
            amount,
        }),
        _ => Err(ApiError::validation(banksampah_core::ledger::INVALID_ENTRY)),
    }
}

fn idempotency_key(headers: &HeaderMap) -> ApiResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::validation("Invalid Idempotency-Key header."))?;
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ApiError::validation("Invalid Idempotency-Key header."));
    }
    Ok(Some(key.to_string()))
}

/// Records a deposit: the transaction, the balance credit and the stock
/// increase are committed together.
pub async fn create_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<DepositRequest>,
) -> ApiResult<(StatusCode, Json<DepositResponse>)> {
    let (Some(name), Some(date), Some(deposits)) = (
        required(&req.name),
        required(&req.date),
        req.deposits
            .as_ref()
            .and_then(Value::as_array)
            .filter(|d| !d.is_empty()),
    ) else {
        return Err(ApiError::validation(DEPOSIT_FIELDS_REQUIRED));
    };
    let date = parse_date(&date)?;

    let entries = deposits
        .iter()
        .map(deposit_entry)
        .collect::<ApiResult<Vec<_>>>()?;

    let outcome = state
        .store
        .record_deposit(DepositDraft {
            name,
            date,
            entries,
            idempotency_key: idempotency_key(&headers)?,
        })
        .await?;

    let tx = &outcome.transaction;
    let status = if outcome.replayed {
        info!(transaction_id = %tx.id, "Deposit replayed from idempotency key");
        StatusCode::OK
    } else {
        metrics::DEPOSITS_TOTAL.inc();
        metrics::DEPOSIT_VALUE_RUPIAH.observe(tx.total_balance as f64);
        info!(
            transaction_id = %tx.id,
            name = %tx.name,
            total = tx.total_balance,
            balance = outcome.balance,
            "Deposit recorded"
        );
        send_receipt(&state, &tx.name, |to| {
            Receipt::for_deposit(to, tx, outcome.balance)
        })
        .await;
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(DepositResponse {
            message: "Deposit transaction added successfully".to_string(),
            transaction_id: tx.id.clone(),
            total_balance: tx.total_balance,
            balance: outcome.balance,
            replayed: outcome.replayed,
        }),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DepositTransaction>>> {
    let transactions = state
        .store
        .list_deposits(&TransactionFilter::default())
        .await?;
    if transactions.is_empty() {
        return Err(ApiError::not_found("No transactions found."));
    }
    Ok(Json(transactions))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DepositTransaction>> {
    state
        .store
        .get_deposit(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transaction not found."))
}

pub async fn search_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionSearch>,
) -> ApiResult<Json<Vec<DepositTransaction>>> {
    let filter = TransactionFilter {
        name: required(&params.name),
        from: required(&params.from).map(|d| parse_date(&d)).transpose()?,
        to: required(&params.to).map(|d| parse_date(&d)).transpose()?,
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ApiError::validation("'from' must not be after 'to'."));
        }
    }
    Ok(Json(state.store.list_deposits(&filter).await?))
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WithdrawalRequest>,
) -> ApiResult<(StatusCode, Json<WithdrawalResponse>)> {
    let (Some(name), Some(date), Some(amount)) =
        (required(&req.name), required(&req.date), req.amount)
    else {
        return Err(ApiError::validation("Name, date, and amount are required."));
    };
    let amount = number(&amount)
        .filter(|rp| *rp > 0.0)
        .ok_or_else(|| ApiError::validation("Withdrawal amount must be a positive number."))?;
    if amount.fract() != 0.0 || amount > i64::MAX as f64 {
        return Err(ApiError::validation(
            "Withdrawal amount must be a whole number of rupiah.",
        ));
    }
    let amount = amount as i64;
    let date = parse_date(&date)?;

    let withdrawal = state
        .store
        .record_withdrawal(WithdrawalDraft { name, date, amount })
        .await?;

    metrics::WITHDRAWALS_TOTAL.inc();
    info!(
        withdrawal_id = %withdrawal.id,
        name = %withdrawal.name,
        amount = withdrawal.amount,
        balance = withdrawal.balance_after,
        "Withdrawal recorded"
    );
    send_receipt(&state, &withdrawal.name, |to| {
        Receipt::for_withdrawal(to, &withdrawal)
    })
    .await;

    Ok((
        StatusCode::CREATED,
        Json(WithdrawalResponse {
            message: "Withdrawal recorded successfully".to_string(),
            withdrawal_id: withdrawal.id,
            balance: withdrawal.balance_after,
        }),
    ))
}

pub async fn list_withdrawals(State(state): State<AppState>) -> ApiResult<Json<Vec<Withdrawal>>> {
    Ok(Json(state.store.list_withdrawals().await?))
}
