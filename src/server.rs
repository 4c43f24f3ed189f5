//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/context/upsert` | Upsert one item `{ title, description, tags, agents }` |
//! | `POST` | `/api/context/import` | Bulk import `{ items: [...] }` |
//! | `POST` | `/api/context/export` | Export one batch, optional `{ limit }` |
//! | `GET`  | `/api/context/{id}` | Fetch a record by UUID |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! The upsert route keeps its own response shape:
//!
//! ```json
//! { "success": false, "message": "Invalid payload" }
//! ```
//!
//! All other routes answer errors as:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Invalid JSON structure." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! An export whose delivery fails still answers `200` with
//! `{ "status": "failed", "message": ... }`; only storage errors produce a 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use vector_sync_core::export::{ExportOutcome, Transport};
use vector_sync_core::upsert::ImportSummary;

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::export::{export_batch, HttpTransport};
use crate::get::{get_context, ContextResponse};
use crate::ingest::{import_payload, upsert_payload};
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub transport: Arc<dyn Transport>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteStore::new(pool)),
        transport: Arc::new(HttpTransport::new(&config.sync)?),
    };

    let app = build_router(state);

    info!(bind = %config.server.bind, "vector sync server listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with permissive CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/context/upsert", post(handle_upsert))
        .route("/api/context/import", post(handle_import))
        .route("/api/context/export", post(handle_export))
        .route("/api/context/{id}", get(handle_get))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Input errors become 400s, anything else a 500.
fn classify_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<IngestError>() {
        Some(e) => bad_request(e.to_string()),
        None => {
            error!(error = %format!("{:#}", err), "request failed");
            internal(format!("{:#}", err))
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/context/upsert ============

/// Handler for `POST /api/context/upsert`.
///
/// The body is read as raw text so malformed JSON gets the same
/// `Invalid payload` answer as a missing field.
async fn handle_upsert(State(state): State<AppState>, body: String) -> Response {
    match upsert_payload(&state.store, &body).await {
        Ok(outcome) => Json(json!({ "success": true, "uuid": outcome.record.id })).into_response(),
        Err(e) if e.downcast_ref::<IngestError>().is_some() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": e.to_string() })),
        )
            .into_response(),
        Err(e) => classify_error(e).into_response(),
    }
}

// ============ POST /api/context/import ============

async fn handle_import(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let summary = import_payload(&state.store, &body)
        .await
        .map_err(classify_error)?;
    Ok(Json(summary))
}

// ============ POST /api/context/export ============

#[derive(Deserialize, Default)]
struct ExportRequest {
    limit: Option<usize>,
}

/// Handler for `POST /api/context/export`.
///
/// An empty body exports `sync.batch_size` records.
async fn handle_export(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ExportOutcome>, AppError> {
    let request: ExportRequest = if body.trim().is_empty() {
        ExportRequest::default()
    } else {
        serde_json::from_str(&body).map_err(|e| bad_request(format!("invalid export request: {}", e)))?
    };

    let outcome = export_batch(
        &state.config,
        &state.store,
        state.transport.as_ref(),
        request.limit,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(outcome))
}

// ============ GET /api/context/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContextResponse>, AppError> {
    match get_context(&state.store, &id).await.map_err(classify_error)? {
        Some(ctx) => Ok(Json(ctx)),
        None => Err(not_found(format!("context not found: {}", id))),
    }
}
