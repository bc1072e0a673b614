use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use banksampah_core::{Customer, CustomerPatch, NewCustomer};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    handlers::{required, SearchParams},
    ApiError, ApiJson, ApiResult, AppState,
};

const CUSTOMER_NOT_FOUND: &str = "Customer not found.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub message: String,
    pub customer_id: String,
}

impl CustomerResponse {
    fn new(message: &str, customer_id: String) -> Self {
        Self {
            message: message.to_string(),
            customer_id,
        }
    }
}

pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CustomerRequest>,
) -> ApiResult<(StatusCode, Json<CustomerResponse>)> {
    let (Some(name), Some(phone_number), Some(address)) = (
        required(&req.name),
        required(&req.phone_number),
        required(&req.address),
    ) else {
        return Err(ApiError::validation(
            "All fields (name, phoneNumber, and address) are required.",
        ));
    };

    let customer = state
        .store
        .insert_customer(NewCustomer {
            name,
            phone_number,
            address,
            email: required(&req.email),
        })
        .await?;
    info!(customer_id = %customer.id, "Customer registered");

    Ok((
        StatusCode::CREATED,
        Json(CustomerResponse::new(
            "Customer registered successfully",
            customer.id,
        )),
    ))
}

pub async fn list_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    let customers = state.store.list_customers().await?;
    if customers.is_empty() {
        return Err(ApiError::not_found("No customers found."));
    }
    Ok(Json(customers))
}

pub async fn customer_names(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let names: Vec<String> = state
        .store
        .list_customers()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    if names.is_empty() {
        return Err(ApiError::not_found("No customers found."));
    }
    Ok(Json(names))
}

pub async fn search_customers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Customer>>> {
    let query = params.query()?;
    Ok(Json(state.store.search_customers(&query).await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    state
        .store
        .get_customer(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(CUSTOMER_NOT_FOUND))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CustomerRequest>,
) -> ApiResult<Json<CustomerResponse>> {
    let patch = CustomerPatch {
        name: required(&req.name),
        phone_number: required(&req.phone_number),
        address: required(&req.address),
        email: required(&req.email),
    };
    if patch.is_empty() {
        return Err(ApiError::validation(
            "At least one field (name, phoneNumber, address, or email) must be provided.",
        ));
    }

    let customer = state
        .store
        .update_customer(&id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found(CUSTOMER_NOT_FOUND))?;

    Ok(Json(CustomerResponse::new(
        "Customer data updated successfully",
        customer.id,
    )))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerResponse>> {
    if !state.store.delete_customer(&id).await? {
        return Err(ApiError::not_found(CUSTOMER_NOT_FOUND));
    }
    info!(customer_id = %id, "Customer deleted");
    Ok(Json(CustomerResponse::new("Customer deleted successfully", id)))
}
