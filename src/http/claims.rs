//! Claim relaying handlers.
//!
//! Each handler validates its body, delegates to the relayer and returns the
//! transaction hash. All precondition checks run inside the relayer in
//! declared order; the handler only decodes inputs it can reject without
//! touching a chain.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::submit::MIN_RELAYER_BALANCE_WEI;
use crate::chain::tx::decode_referral;
use crate::relayer::{self, ClaimParameters, ClaimRequest, ClaimStatus, ClaimVariant};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claim", post(claim))
        .route("/claim-no-code", post(claim_no_code))
        .route("/claim-custom", post(claim_custom))
        .route("/claim-status/{chain_id}/{faucet}/{user}", get(claim_status))
        .route("/whitelist", post(whitelist))
        .route("/set-claim-parameters", post(set_claim_parameters))
        .route("/relayer-status/{chain_id}", get(relayer_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodedClaimBody {
    user_address: String,
    faucet_address: String,
    secret_code: String,
    chain_id: u64,
    #[serde(default)]
    should_whitelist: bool,
    divvi_referral_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodelessClaimBody {
    user_address: String,
    faucet_address: String,
    chain_id: u64,
    #[serde(default)]
    should_whitelist: bool,
    divvi_referral_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomClaimBody {
    user_address: String,
    faucet_address: String,
    chain_id: u64,
    divvi_referral_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TxResponse {
    success: bool,
    tx_hash: String,
}

fn parse_referral(data: Option<&str>) -> Result<Vec<u8>, HttpError> {
    match data {
        None => Ok(Vec::new()),
        Some(raw) => decode_referral(raw)
            .map_err(|err| HttpError::bad_request(format!("divviReferralData: {err}"))),
    }
}

async fn claim(
    State(state): State<AppState>,
    Json(body): Json<CodedClaimBody>,
) -> Result<Json<TxResponse>, HttpError> {
    if body.secret_code.trim().is_empty() {
        return Err(HttpError::bad_request(
            "secretCode must be provided".to_string(),
        ));
    }
    let referral = parse_referral(body.divvi_referral_data.as_deref())?;

    let tx_hash = relayer::claim(
        &state,
        ClaimRequest {
            user_address: body.user_address,
            faucet_address: body.faucet_address,
            chain_id: body.chain_id,
            should_whitelist: body.should_whitelist,
            referral,
        },
        ClaimVariant::Coded {
            secret_code: body.secret_code.trim().to_string(),
        },
    )
    .await?;

    Ok(Json(TxResponse {
        success: true,
        tx_hash,
    }))
}

async fn claim_no_code(
    State(state): State<AppState>,
    Json(body): Json<CodelessClaimBody>,
) -> Result<Json<TxResponse>, HttpError> {
    let referral = parse_referral(body.divvi_referral_data.as_deref())?;

    let tx_hash = relayer::claim(
        &state,
        ClaimRequest {
            user_address: body.user_address,
            faucet_address: body.faucet_address,
            chain_id: body.chain_id,
            should_whitelist: body.should_whitelist,
            referral,
        },
        ClaimVariant::Codeless,
    )
    .await?;

    Ok(Json(TxResponse {
        success: true,
        tx_hash,
    }))
}

async fn claim_custom(
    State(state): State<AppState>,
    Json(body): Json<CustomClaimBody>,
) -> Result<Json<TxResponse>, HttpError> {
    let referral = parse_referral(body.divvi_referral_data.as_deref())?;

    let tx_hash = relayer::claim(
        &state,
        ClaimRequest {
            user_address: body.user_address,
            faucet_address: body.faucet_address,
            chain_id: body.chain_id,
            should_whitelist: false,
            referral,
        },
        ClaimVariant::Custom,
    )
    .await?;

    Ok(Json(TxResponse {
        success: true,
        tx_hash,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimStatusResponse {
    success: bool,
    #[serde(flatten)]
    status: ClaimStatus,
}

/// Pre-claim probe: faucet pause state and the user's claim eligibility.
async fn claim_status(
    State(state): State<AppState>,
    Path((chain_id, faucet, user)): Path<(u64, String, String)>,
) -> Result<Json<ClaimStatusResponse>, HttpError> {
    let status = relayer::claim_status(&state, chain_id, &faucet, &user).await?;
    Ok(Json(ClaimStatusResponse {
        success: true,
        status,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayerStatusResponse {
    success: bool,
    operator: String,
    chain_id: u64,
    balance: String,
    native_symbol: String,
    funded: bool,
}

/// Operator funding probe per chain, for dashboards and alerting.
async fn relayer_status(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
) -> Result<Json<RelayerStatusResponse>, HttpError> {
    let client = state.registry.connect(chain_id).await?;
    let balance = client.native_balance(state.operator.address()).await?;

    Ok(Json(RelayerStatusResponse {
        success: true,
        operator: state.operator.address().to_checksum(None),
        chain_id,
        balance: alloy::primitives::utils::format_ether(balance),
        native_symbol: client.descriptor().native_symbol.to_string(),
        funded: balance >= MIN_RELAYER_BALANCE_WEI,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhitelistBody {
    faucet_address: String,
    user_address: String,
    admin_address: String,
    chain_id: u64,
}

async fn whitelist(
    State(state): State<AppState>,
    Json(body): Json<WhitelistBody>,
) -> Result<Json<TxResponse>, HttpError> {
    let tx_hash = relayer::whitelist(
        &state,
        body.chain_id,
        &body.faucet_address,
        &body.user_address,
        &body.admin_address,
    )
    .await?;

    Ok(Json(TxResponse {
        success: true,
        tx_hash,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetClaimParametersBody {
    faucet_address: String,
    claim_amount: f64,
    start_time: i64,
    end_time: i64,
    chain_id: u64,
    tasks: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetClaimParametersResponse {
    success: bool,
    secret_code: String,
    tasks_stored: bool,
}

async fn set_claim_parameters(
    State(state): State<AppState>,
    Json(body): Json<SetClaimParametersBody>,
) -> Result<Json<SetClaimParametersResponse>, HttpError> {
    if !body.claim_amount.is_finite() || body.claim_amount <= 0.0 {
        return Err(HttpError::bad_request(
            "claimAmount must be a positive number".to_string(),
        ));
    }
    if body.start_time < 0 {
        return Err(HttpError::bad_request(
            "startTime must be a unix timestamp".to_string(),
        ));
    }
    if body.end_time <= body.start_time {
        return Err(HttpError::bad_request(
            "endTime must be after startTime".to_string(),
        ));
    }

    let outcome = relayer::set_claim_parameters(
        &state,
        ClaimParameters {
            faucet_address: body.faucet_address,
            claim_amount: body.claim_amount,
            start_time: body.start_time,
            end_time: body.end_time,
            chain_id: body.chain_id,
            tasks: body.tasks,
        },
    )
    .await?;

    Ok(Json(SetClaimParametersResponse {
        success: true,
        secret_code: outcome.secret_code,
        tasks_stored: outcome.tasks_stored,
    }))
}
