use crate::http::ApiError;
use crate::models::BillingSummary;
use crate::startup::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub planned_closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingResponse {
    pub billing_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineItemRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
}

pub async fn create_billing(
    State(state): State<AppState>,
    Json(req): Json<CreateBillingRequest>,
) -> Result<Json<CreateBillingResponse>, ApiError> {
    if req.user_id.is_empty() {
        warn!("Rejected create billing: user id missing");
        return Err(ApiError::invalid_argument("user id is required"));
    }
    if req.currency.is_empty() {
        warn!("Rejected create billing: currency missing");
        return Err(ApiError::invalid_argument("currency is required"));
    }
    if let Some(planned_closed_at) = req.planned_closed_at {
        if planned_closed_at <= Utc::now() {
            warn!("Rejected create billing: planned closed at is in the past");
            return Err(ApiError::invalid_argument("planned closed at is in the past"));
        }
    }

    let billing_id = state
        .create_billing
        .execute(
            &req.user_id,
            &req.description,
            &req.currency,
            req.planned_closed_at,
        )
        .await?;

    Ok(Json(CreateBillingResponse { billing_id }))
}

pub async fn add_line_item(
    State(state): State<AppState>,
    Path(billing_id): Path<String>,
    Json(req): Json<AddLineItemRequest>,
) -> Result<(), ApiError> {
    if req.amount <= 0.0 {
        warn!("Rejected line item: amount must be greater than 0");
        return Err(ApiError::invalid_argument("amount must be greater than 0"));
    }

    state
        .add_line_item
        .execute(&billing_id, &req.description, req.amount)
        .await?;

    Ok(())
}

pub async fn close_billing(
    State(state): State<AppState>,
    Path(billing_id): Path<String>,
) -> Result<(), ApiError> {
    state.close_billing.execute(&billing_id).await?;
    Ok(())
}

pub async fn get_billing_summary(
    State(state): State<AppState>,
    Path(billing_id): Path<String>,
) -> Result<Json<BillingSummary>, ApiError> {
    let summary = state.get_billing_summary.execute(&billing_id).await?;
    Ok(Json(summary))
}
