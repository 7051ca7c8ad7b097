//! Admin-popup preference handlers: a per-(user, faucet) "don't show this
//! again" flag the faucet admin UI reads back.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

use crate::chain::checksummed;
use crate::entities::popup_preference;
use crate::entities::prelude::PopupPreference;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin-popup-preference", post(set_preference))
        .route(
            "/admin-popup-preference/{user}/{faucet}",
            get(get_preference),
        )
        .route("/admin-popup-preferences/{user}", get(list_preferences))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPreferenceBody {
    user_address: String,
    faucet_address: String,
    dont_show_admin_popup: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetPreferenceResponse {
    success: bool,
    dont_show_admin_popup: bool,
}

async fn set_preference(
    State(state): State<AppState>,
    Json(body): Json<SetPreferenceBody>,
) -> Result<Json<SetPreferenceResponse>, HttpError> {
    let user_key = checksummed(&body.user_address)?;
    let faucet_key = checksummed(&body.faucet_address)?;

    let model = popup_preference::ActiveModel {
        user_address: Set(user_key),
        faucet_address: Set(faucet_key),
        dont_show_admin_popup: Set(body.dont_show_admin_popup),
        updated_at: Set(Utc::now().fixed_offset()),
    };
    PopupPreference::insert(model)
        .on_conflict(
            OnConflict::columns([
                popup_preference::Column::UserAddress,
                popup_preference::Column::FaucetAddress,
            ])
            .update_columns([
                popup_preference::Column::DontShowAdminPopup,
                popup_preference::Column::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec(&state.database)
        .await
        .map_err(store_error)?;

    Ok(Json(SetPreferenceResponse {
        success: true,
        dont_show_admin_popup: body.dont_show_admin_popup,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceResponse {
    success: bool,
    user_address: String,
    faucet_address: String,
    /// Defaults to false (show the popup) when no row exists
    dont_show_admin_popup: bool,
}

async fn get_preference(
    State(state): State<AppState>,
    Path((user, faucet)): Path<(String, String)>,
) -> Result<Json<PreferenceResponse>, HttpError> {
    let user_key = checksummed(&user)?;
    let faucet_key = checksummed(&faucet)?;

    let row = PopupPreference::find_by_id((user_key.clone(), faucet_key.clone()))
        .one(&state.database)
        .await
        .map_err(store_error)?;

    Ok(Json(PreferenceResponse {
        success: true,
        user_address: user_key,
        faucet_address: faucet_key,
        dont_show_admin_popup: row.map(|r| r.dont_show_admin_popup).unwrap_or(false),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceListResponse {
    success: bool,
    preferences: Vec<PreferenceEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceEntry {
    faucet_address: String,
    dont_show_admin_popup: bool,
    updated_at: i64,
}

fn store_error(err: sea_orm::DbErr) -> HttpError {
    HttpError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "CacheUnavailable",
        err.to_string(),
    )
}

async fn list_preferences(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<PreferenceListResponse>, HttpError> {
    let user_key = checksummed(&user)?;

    let rows = PopupPreference::find()
        .filter(popup_preference::Column::UserAddress.eq(&user_key))
        .all(&state.database)
        .await
        .map_err(store_error)?;

    let preferences = rows
        .into_iter()
        .map(|row| PreferenceEntry {
            faucet_address: row.faucet_address,
            dont_show_admin_popup: row.dont_show_admin_popup,
            updated_at: row.updated_at.timestamp(),
        })
        .collect();

    Ok(Json(PreferenceListResponse {
        success: true,
        preferences,
    }))
}
