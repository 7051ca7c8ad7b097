use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::RelayError;
use crate::state::AppState;

mod analytics;
mod claims;
mod codes;
mod preferences;
mod sweeper;

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    let cors = cors_layer(cors_origins);

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .merge(claims::router())
        .merge(codes::router())
        .merge(preferences::router())
        .merge(sweeper::router())
        .merge(analytics::router())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        // Development default; deployments list their frontends explicitly
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    assert_eq!(
        parsed.len(),
        origins.len(),
        "Every configured CORS origin must be a valid header value"
    );
    layer.allow_origin(parsed)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    assert!(
        uptime <= 31_536_000,
        "Uptime exceeds one year without restart"
    );
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, "Unavailable", err.to_string()))?;

    let response = ReadyResponse {
        status: "ready",
        operator: state.operator.address().to_checksum(None),
        analytics_updating: state.aggregator.is_updating(),
        chart_cache_entries: state.cache.charts.entry_count(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    operator: String,
    analytics_updating: bool,
    chart_cache_entries: u64,
}

/// Error envelope every handler returns on failure:
/// `{success: false, error: {kind, message, txHash?}}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    tx_hash: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode, kind: &'static str, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self {
            status,
            kind,
            message,
            tx_hash: None,
        }
    }

    pub fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }

    pub fn not_found(message: String) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }
}

impl From<RelayError> for HttpError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::BadAddress(_)
            | RelayError::UnsupportedChain(_)
            | RelayError::CodeInvalid
            | RelayError::CodeExpired
            | RelayError::CodeFuture
            | RelayError::FaucetPaused
            | RelayError::AlreadyClaimed
            | RelayError::NoCustomAmount
            | RelayError::ZeroCustomAmount => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized | RelayError::NotContractOwner => StatusCode::FORBIDDEN,
            RelayError::CodeMissing => StatusCode::NOT_FOUND,
            RelayError::RpcUnavailable { .. }
            | RelayError::InsufficientRelayerFunds { .. }
            | RelayError::ChainReverted { .. }
            | RelayError::TxTimeout { .. }
            | RelayError::CacheUnavailable(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
            tx_hash: err.tx_hash().map(str::to_string),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error [{}]: {}", self.kind, self.message);
        let body = Json(ErrorEnvelope {
            success: false,
            error: ErrorBody {
                kind: self.kind,
                message: self.message,
                tx_hash: self.tx_hash,
            },
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_map_to_client_status() {
        assert_eq!(
            HttpError::from(RelayError::CodeExpired).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::from(RelayError::FaucetPaused).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::from(RelayError::Unauthorized).status,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            HttpError::from(RelayError::CodeMissing).status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn execution_errors_keep_their_tx_hash() {
        let err = HttpError::from(RelayError::TxTimeout {
            tx_hash: "0xabc".to_string(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(err.kind, "TxTimeout");
    }

    #[test]
    fn error_envelope_shape() {
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                kind: "ChainReverted",
                message: "execution reverted: paused".to_string(),
                tx_hash: Some("0xabc".to_string()),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "ChainReverted");
        assert_eq!(json["error"]["txHash"], "0xabc");

        // The hash field is omitted entirely for precondition failures
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                kind: "FaucetPaused",
                message: "faucet is paused".to_string(),
                tx_hash: None,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["error"].get("txHash").is_none());
    }
}
