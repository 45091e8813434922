//! Dashboard JSON API.
//!
//! - `GET  /api/status`         - analyzer and configuration summary
//! - `GET  /api/watchlist`      - current watchlist
//! - `POST /api/watchlist`      - replace the watchlist
//! - `POST /api/analyze`        - run a cycle now, blocking until it ends
//! - `GET  /api/alerts`         - alert history, most recent first
//! - `GET  /api/data`           - latest observation per watchlisted symbol
//! - `POST /api/test-telegram`  - send a sample alert
//! - `GET  /health`

use crate::state::SharedState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stockwatch_alerts::DbError;
use stockwatch_core::{AlertRecord, Symbol};
use stockwatch_engine::{AnalyzerError, StockSnapshot};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const DEFAULT_ALERT_LIMIT: i64 = 20;
const MAX_ALERT_LIMIT: i64 = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("analysis already running")]
    Busy,
    #[error(transparent)]
    Storage(#[from] DbError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::AlreadyRunning => ApiError::Busy,
            AnalyzerError::Db(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Busy => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub is_running: bool,
    pub watchlist_size: usize,
    pub last_analysis: Option<DateTime<Utc>>,
    pub telegram_configured: bool,
    pub finnhub_configured: bool,
    pub alert_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistBody {
    /// Missing means an empty list.
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistResponse {
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistUpdated {
    pub success: bool,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub alerts_sent: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<i64>,
}

impl AlertsQuery {
    fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ALERT_LIMIT)
            .clamp(1, MAX_ALERT_LIMIT)
    }
}

/// One entry of the alert history as shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct AlertView {
    pub symbol: String,
    pub change_percent: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<AlertRecord> for AlertView {
    fn from(record: AlertRecord) -> Self {
        Self {
            symbol: record.symbol,
            change_percent: record.change_percent,
            price: record.price,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertView>,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub stocks: Vec<StockSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct TestTelegramResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create the API router.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/watchlist", get(get_watchlist).post(update_watchlist))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/data", get(data_handler))
        .route("/api/test-telegram", post(test_telegram_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> &'static str {
    "OK"
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let status = state.analyzer.status().await;
    Json(StatusResponse {
        is_running: status.is_running,
        watchlist_size: status.watchlist_size,
        last_analysis: status.last_analysis,
        telegram_configured: state.config.telegram_configured(),
        finnhub_configured: state.config.finnhub_configured(),
        alert_threshold: state.analyzer.config().alert_threshold.value(),
    })
}

async fn get_watchlist(State(state): State<SharedState>) -> Json<WatchlistResponse> {
    Json(WatchlistResponse {
        symbols: state.analyzer.watchlist().await,
    })
}

async fn update_watchlist(
    State(state): State<SharedState>,
    Json(body): Json<WatchlistBody>,
) -> Result<Json<WatchlistUpdated>, ApiError> {
    let symbols = state.analyzer.replace_watchlist(&body.symbols).await?;
    Ok(Json(WatchlistUpdated {
        success: true,
        symbols,
    }))
}

/// Runs a full cycle before responding. The cycle itself runs in its own
/// task so a dropped connection cannot interrupt it.
async fn analyze_handler(
    State(state): State<SharedState>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let guard = state.analyzer.try_begin().map_err(|e| {
        warn!("Manual analysis rejected: {}", e);
        ApiError::from(e)
    })?;

    info!("Manual analysis triggered");
    let analyzer = Arc::clone(&state.analyzer);
    let report = tokio::spawn(async move { analyzer.run_cycle(guard).await })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AnalyzeResponse {
        success: true,
        alerts_sent: report.alerts_sent,
    }))
}

async fn alerts_handler(
    State(state): State<SharedState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let alerts = state
        .analyzer
        .recent_alerts(query.effective_limit())
        .await?
        .into_iter()
        .map(AlertView::from)
        .collect();
    Ok(Json(AlertsResponse { alerts }))
}

async fn data_handler(State(state): State<SharedState>) -> Result<Json<DataResponse>, ApiError> {
    let stocks = state.analyzer.current_data().await?;
    Ok(Json(DataResponse { stocks }))
}

async fn test_telegram_handler(State(state): State<SharedState>) -> Json<TestTelegramResponse> {
    match state.analyzer.send_test_notification().await {
        Ok(()) => Json(TestTelegramResponse {
            success: true,
            error: None,
        }),
        Err(e) => {
            warn!(error = %e, "Test notification failed");
            Json(TestTelegramResponse {
                success: false,
                error: Some(e.to_string()),
            })
        }
    }
}
