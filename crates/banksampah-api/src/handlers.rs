use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use banksampah_core::{Receipt, DATE_FORMAT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{metrics, ApiError, ApiResult, AppState};

/// Trimmed value of a required text field, `None` when missing or blank.
pub fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A finite JSON number, or a string holding one (`"2.5"`).
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub fn parse_date(value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::validation("Invalid date, expected YYYY-MM-DD."))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

impl SearchParams {
    pub fn query(&self) -> ApiResult<String> {
        required(&self.q).ok_or_else(|| ApiError::validation("Search query must not be empty."))
    }
}

/// Mails a receipt to the customer registered under `name`, if they have an
/// email address. Runs in the background; failures are only logged.
pub async fn send_receipt(
    state: &AppState,
    name: &str,
    build: impl FnOnce(String) -> Receipt,
) {
    let customer = match state.store.find_customer_by_name(name).await {
        Ok(customer) => customer,
        Err(e) => {
            warn!(name = %name, error = %e, "Customer lookup for receipt failed");
            return;
        }
    };
    let Some(email) = customer.and_then(|c| c.email) else {
        return;
    };

    let receipt = build(email);
    let sender = state.receipts.clone();
    tokio::spawn(async move {
        if let Err(e) = sender.send(&receipt).await {
            metrics::RECEIPT_FAILURES_TOTAL.inc();
            warn!(
                to = %receipt.to,
                reference_id = %receipt.reference_id,
                error = %e,
                "Receipt delivery failed"
            );
        }
    });
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check(State(_state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
