use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use banksampah_core::{WasteType, WasteTypePatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    handlers::{number, required, SearchParams},
    ApiError, ApiJson, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteTypeRequest {
    pub name: Option<String>,
    pub price_per_kg: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteTypeResponse {
    pub message: String,
    pub waste_type_id: String,
}

/// Prices are whole rupiah; fractional input is rounded.
fn rupiah(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let rounded = price.round();
    (rounded >= 1.0 && rounded <= i64::MAX as f64).then_some(rounded as i64)
}

fn waste_type_not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("Waste type with ID {id} not found."))
}

pub async fn create_waste_type(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WasteTypeRequest>,
) -> ApiResult<(StatusCode, Json<WasteTypeResponse>)> {
    let price_per_kg = req.price_per_kg.as_ref().and_then(number).and_then(rupiah);
    let (Some(name), Some(price_per_kg)) = (required(&req.name), price_per_kg) else {
        return Err(ApiError::validation("Both name and price per kg are required."));
    };

    let waste_type = state.store.insert_waste_type(name, price_per_kg).await?;
    info!(waste_type_id = %waste_type.id, name = %waste_type.name, "Waste type added");

    Ok((
        StatusCode::CREATED,
        Json(WasteTypeResponse {
            message: "Waste type added successfully".to_string(),
            waste_type_id: waste_type.id,
        }),
    ))
}

pub async fn list_waste_types(State(state): State<AppState>) -> ApiResult<Json<Vec<WasteType>>> {
    Ok(Json(state.store.list_waste_types().await?))
}

pub async fn search_waste_types(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<WasteType>>> {
    let query = params.query()?;
    Ok(Json(state.store.search_waste_types(&query).await?))
}

pub async fn get_waste_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WasteType>> {
    state
        .store
        .get_waste_type(&id)
        .await?
        .map(Json)
        .ok_or_else(|| waste_type_not_found(&id))
}

pub async fn update_waste_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<WasteTypeRequest>,
) -> ApiResult<Json<WasteTypeResponse>> {
    let price_per_kg = match &req.price_per_kg {
        Some(price) => Some(
            number(price)
                .and_then(rupiah)
                .ok_or_else(|| ApiError::validation("Price per kg must be a positive number."))?,
        ),
        None => None,
    };
    let patch = WasteTypePatch {
        name: required(&req.name),
        price_per_kg,
    };
    if patch.name.is_none() && patch.price_per_kg.is_none() {
        return Err(ApiError::validation(
            "At least one field (name or price per kg) must be provided.",
        ));
    }

    let waste_type = state
        .store
        .update_waste_type(&id, patch)
        .await?
        .ok_or_else(|| waste_type_not_found(&id))?;

    Ok(Json(WasteTypeResponse {
        message: "Waste type updated successfully".to_string(),
        waste_type_id: waste_type.id,
    }))
}

pub async fn delete_waste_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WasteTypeResponse>> {
    if !state.store.delete_waste_type(&id).await? {
        return Err(waste_type_not_found(&id));
    }
    info!(waste_type_id = %id, "Waste type deleted");
    Ok(Json(WasteTypeResponse {
        message: "Waste type deleted successfully".to_string(),
        waste_type_id: id,
    }))
}
