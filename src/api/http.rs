use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::ApiConfig;
use crate::database::TransactionStore;
use crate::error::DatabaseError;
use crate::models::CanonicalTransaction;

pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Server error: {0}")]
    Server(String),
}

impl From<ApiError> for StatusCode {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Database(DatabaseError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiError> for (StatusCode, Json<ErrorResponse>) {
    fn from(error: ApiError) -> Self {
        let (code, message) = match &error {
            ApiError::Database(DatabaseError::NotFound(digest)) => {
                ("not_found", format!("Transaction {} not found", digest))
            }
            ApiError::Database(e) => {
                log::error!("API request failed: {}", e);
                ("database_error", e.to_string())
            }
            ApiError::InvalidParameter(message) => ("invalid_parameter", message.clone()),
            ApiError::Server(message) => ("server_error", message.clone()),
        };

        (
            StatusCode::from(error),
            Json(ErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Response structure for status endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub total_transactions: u64,
    pub latest_digest: Option<String>,
    pub latest_checkpoint: Option<i64>,
    pub database_status: String,
}

/// Response structure for transactions endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<CanonicalTransaction>,
    pub total_count: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

/// Query parameters for transactions endpoint
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TransactionStore>,
}

/// Read-only routes over the transaction store
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .route("/transactions", get(get_transactions))
        .route("/transactions/:digest", get(get_transaction))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// HTTP API server
pub struct ApiServer {
    store: Arc<TransactionStore>,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(store: Arc<TransactionStore>, config: &ApiConfig) -> Self {
        Self {
            store,
            host: config.host.clone(),
            port: config.port,
        }
    }

    pub async fn start(&self) -> Result<(), ApiError> {
        let app = router(AppState {
            store: self.store.clone(),
        });

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP API server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /status - row count and the newest stored transaction
pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let total_transactions = state.store.count().map_err(ApiError::from)?;
    let newest = state
        .store
        .get_recent_transactions(1, 0)
        .map_err(ApiError::from)?
        .into_iter()
        .next();

    Ok(Json(StatusResponse {
        status: "healthy".to_string(),
        total_transactions,
        latest_digest: newest.as_ref().map(|tx| tx.digest.clone()),
        latest_checkpoint: newest.as_ref().map(|tx| tx.checkpoint),
        database_status: "connected".to_string(),
    }))
}

/// GET /transactions - newest first, paginated
pub async fn get_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> ApiResult<TransactionsResponse> {
    if params.limit == 0 {
        return Err(ApiError::InvalidParameter("Limit must be greater than 0".to_string()).into());
    }

    if params.limit > MAX_PAGE_SIZE {
        return Err(ApiError::InvalidParameter(format!("Limit cannot exceed {}", MAX_PAGE_SIZE)).into());
    }

    let transactions = state
        .store
        .get_recent_transactions(params.limit, params.offset)
        .map_err(ApiError::from)?;
    let total_count = state.store.count().map_err(ApiError::from)?;

    let has_more = u64::from(params.offset) + (transactions.len() as u64) < total_count;

    Ok(Json(TransactionsResponse {
        transactions,
        total_count,
        limit: params.limit,
        offset: params.offset,
        has_more,
    }))
}

/// GET /transactions/:digest
pub async fn get_transaction(
    Path(digest): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<CanonicalTransaction> {
    let transaction = state.store.get_transaction(&digest).map_err(ApiError::from)?;
    Ok(Json(transaction))
}
