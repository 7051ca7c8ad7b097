//! USDT sweeper handlers.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::sweeper::{self, BulkSweepStatus, SweepOutcome, SweepRequest};

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check-and-transfer-usdt", post(check_and_transfer))
        .route("/check-and-transfer-usdt/bulk", post(check_and_transfer_bulk))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepBody {
    user_address: String,
    chain_id: u64,
    /// Management contract address; the ERC-20 itself is discovered on-chain
    usdt_contract_address: String,
    to_address: String,
    transfer_amount: Option<f64>,
    threshold_amount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepResponse {
    success: bool,
    #[serde(flatten)]
    outcome: SweepOutcome,
}

fn validate_amounts(
    transfer_amount: Option<f64>,
    threshold_amount: Option<f64>,
) -> Result<f64, HttpError> {
    if let Some(amount) = transfer_amount {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(HttpError::bad_request(
                "transferAmount must be a positive number".to_string(),
            ));
        }
    }
    let threshold = threshold_amount.unwrap_or(sweeper::DEFAULT_THRESHOLD);
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(HttpError::bad_request(
            "thresholdAmount must be a positive number".to_string(),
        ));
    }
    Ok(threshold)
}

async fn check_and_transfer(
    State(state): State<AppState>,
    Json(body): Json<SweepBody>,
) -> Result<Json<SweepResponse>, HttpError> {
    let threshold = validate_amounts(body.transfer_amount, body.threshold_amount)?;

    let outcome = sweeper::check_and_transfer(
        &state,
        SweepRequest {
            user_address: body.user_address,
            to_address: body.to_address,
            management_address: body.usdt_contract_address,
            chain_id: body.chain_id,
            amount: body.transfer_amount,
            threshold,
        },
    )
    .await?;

    Ok(Json(SweepResponse {
        success: true,
        outcome,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkSweepBody {
    user_addresses: Vec<String>,
    chain_id: u64,
    usdt_contract_address: String,
    to_address: String,
    transfer_amount: Option<f64>,
    threshold_amount: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkSweepResponse {
    success: bool,
    results: Vec<BulkSweepStatus>,
}

async fn check_and_transfer_bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkSweepBody>,
) -> Result<Json<BulkSweepResponse>, HttpError> {
    if body.user_addresses.is_empty() {
        return Err(HttpError::bad_request(
            "userAddresses must not be empty".to_string(),
        ));
    }
    if body.user_addresses.len() > 256 {
        return Err(HttpError::bad_request(
            "userAddresses exceeds the 256-entry batch limit".to_string(),
        ));
    }
    let threshold = validate_amounts(body.transfer_amount, body.threshold_amount)?;

    let results = sweeper::check_and_transfer_bulk(
        &state,
        body.user_addresses,
        body.to_address,
        body.usdt_contract_address,
        body.chain_id,
        body.transfer_amount,
        threshold,
    )
    .await;

    Ok(Json(BulkSweepResponse {
        success: true,
        results,
    }))
}
