//! Analytics handlers: trigger an update run, read chart documents.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::analytics::{self, UpdateOutcome};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/update", post(trigger_update))
        .route("/analytics/{chart}", get(read_chart))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    success: bool,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    networks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    faucets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transactions: Option<u64>,
}

async fn trigger_update(
    State(state): State<AppState>,
) -> Result<Json<UpdateResponse>, HttpError> {
    match state.aggregator.run_update().await? {
        UpdateOutcome::Completed(report) => Ok(Json(UpdateResponse {
            success: true,
            status: "completed",
            networks: Some(report.networks),
            faucets: Some(report.faucets),
            transactions: Some(report.transactions),
        })),
        UpdateOutcome::InProgress => Ok(Json(UpdateResponse {
            success: true,
            status: "in_progress",
            networks: None,
            faucets: None,
            transactions: None,
        })),
    }
}

#[derive(Debug, Serialize)]
struct ChartResponse {
    success: bool,
    data: Value,
}

/// Route path segment → cache key. `status` is the public name of the
/// internal update_status row.
fn cache_key_for(chart: &str) -> Option<&'static str> {
    match chart {
        "dashboard" => Some(analytics::KEY_DASHBOARD),
        "faucets" => Some(analytics::KEY_FAUCETS),
        "transactions" => Some(analytics::KEY_TRANSACTIONS),
        "users" => Some(analytics::KEY_USERS),
        "claims" => Some(analytics::KEY_CLAIMS),
        "status" => Some(analytics::KEY_UPDATE_STATUS),
        _ => None,
    }
}

async fn read_chart(
    State(state): State<AppState>,
    Path(chart): Path<String>,
) -> Result<Json<ChartResponse>, HttpError> {
    let key = cache_key_for(&chart)
        .ok_or_else(|| HttpError::bad_request(format!("Unknown analytics chart {chart:?}")))?;

    let data = state
        .aggregator
        .read_key(key)
        .await?
        .ok_or_else(|| HttpError::not_found(format!("No {chart} data yet; run an update")))?;

    Ok(Json(ChartResponse {
        success: true,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_names_map_to_cache_keys() {
        assert_eq!(cache_key_for("dashboard"), Some("dashboard"));
        assert_eq!(cache_key_for("status"), Some("update_status"));
        assert_eq!(cache_key_for("last_updated"), None);
        assert_eq!(cache_key_for("bogus"), None);
    }
}
