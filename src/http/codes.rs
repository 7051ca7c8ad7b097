//! Drop-code handlers: rotation and metadata reads.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chain::checksummed;
use crate::codes::{self, CodeMetadata};
use crate::relayer;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-new-drop-code", post(generate_new_drop_code))
        .route("/secret-code/retrieve", post(retrieve_secret_code))
        .route("/secret-code/{faucet}", get(secret_code_metadata))
        .route("/secret-code/{faucet}/valid", get(secret_code_validity))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateDropCodeBody {
    faucet_address: String,
    user_address: String,
    chain_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateDropCodeResponse {
    success: bool,
    secret_code: String,
}

/// Rotate the faucet's drop code; the requesting user must hold on-chain
/// authority over the faucet.
async fn generate_new_drop_code(
    State(state): State<AppState>,
    Json(body): Json<GenerateDropCodeBody>,
) -> Result<Json<GenerateDropCodeResponse>, HttpError> {
    let secret_code = relayer::rotate_code(
        &state,
        body.chain_id,
        &body.faucet_address,
        &body.user_address,
    )
    .await?;

    Ok(Json(GenerateDropCodeResponse {
        success: true,
        secret_code,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveCodeBody {
    faucet_address: String,
    user_address: String,
    chain_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveCodeResponse {
    success: bool,
    secret_code: String,
    #[serde(flatten)]
    metadata: CodeMetadata,
}

/// Return the code value itself to an on-chain-authorized admin. This is the
/// only read that exposes the code.
async fn retrieve_secret_code(
    State(state): State<AppState>,
    Json(body): Json<RetrieveCodeBody>,
) -> Result<Json<RetrieveCodeResponse>, HttpError> {
    let row = relayer::reveal_code(
        &state,
        body.chain_id,
        &body.faucet_address,
        &body.user_address,
    )
    .await?;

    let metadata = CodeMetadata::from_row(&row, Utc::now().timestamp());
    Ok(Json(RetrieveCodeResponse {
        success: true,
        secret_code: row.code,
        metadata,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CodeMetadataResponse {
    success: bool,
    #[serde(flatten)]
    metadata: CodeMetadata,
}

/// Window metadata for a faucet's code. Never returns the code value.
async fn secret_code_metadata(
    State(state): State<AppState>,
    Path(faucet): Path<String>,
) -> Result<Json<CodeMetadataResponse>, HttpError> {
    let faucet_key = checksummed(&faucet)?;
    let row = codes::find_row(&state.database, &faucet_key)
        .await?
        .ok_or_else(|| HttpError::not_found(format!("No drop code set for {faucet_key}")))?;

    let metadata = CodeMetadata::from_row(&row, Utc::now().timestamp());
    Ok(Json(CodeMetadataResponse {
        success: true,
        metadata,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CodeValidityResponse {
    success: bool,
    is_valid: bool,
}

/// Light probe for frontends that only need "can a coded claim run now".
/// A faucet with no code at all reports invalid instead of 404.
async fn secret_code_validity(
    State(state): State<AppState>,
    Path(faucet): Path<String>,
) -> Result<Json<CodeValidityResponse>, HttpError> {
    let faucet_key = checksummed(&faucet)?;
    let now = Utc::now().timestamp();
    let is_valid = codes::find_row(&state.database, &faucet_key)
        .await?
        .map(|row| now >= row.start_time && now <= row.end_time)
        .unwrap_or(false);

    Ok(Json(CodeValidityResponse {
        success: true,
        is_valid,
    }))
}
