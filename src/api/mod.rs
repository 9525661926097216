// HTTP API routes (state query/update/reset, note listing, events, static assets).

pub mod events;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::TrackerError;
use crate::metrics;
use crate::registry::ProfileRegistry;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ClientRequest {
    pub poe_client: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProfileRegistry>,
    pub notes_dir: PathBuf,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn tracker_error(e: TrackerError) -> Response {
    match e {
        TrackerError::UnknownProfile(_) => {
            json_error(StatusCode::NOT_FOUND, &e.to_string()).into_response()
        }
        TrackerError::LogUnavailable { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(json!({ "error": e.to_string(), "retryable": true })),
        )
            .into_response(),
    }
}

fn internal_error(e: tokio::task::JoinError) -> Response {
    tracing::error!("Profile task failed: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

/// Parse a `{"poe_client": ..}` body. The overlay page may post it without a
/// JSON content type, so the header is not checked.
fn client_request(body: &[u8]) -> Result<ClientRequest, Response> {
    serde_json::from_slice(body).map_err(|e| {
        json_error(StatusCode::BAD_REQUEST, &format!("Invalid request body: {e}")).into_response()
    })
}

/// Every profile's state as JSON, never cached by the browser.
fn state_response(registry: &ProfileRegistry) -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Json(registry.snapshot_all()),
    )
        .into_response()
}

// ── Router ────────────────────────────────────────────────────────────

/// API routes only.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(get_data).post(update_data))
        .route("/reset", post(reset_data))
        .route("/note", get(list_notes))
        .route("/events", get(events::state_events))
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

/// The full application: API routes, helper notes under `/notes`, overlay assets
/// for everything else.
pub fn app(registry: Arc<ProfileRegistry>, notes_dir: &Path, static_dir: &Path) -> Router {
    let state = AppState {
        registry,
        notes_dir: notes_dir.to_path_buf(),
    };

    router(state)
        .nest_service("/notes", ServeDir::new(notes_dir))
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::from_fn(track_requests))
        .layer(CorsLayer::permissive())
}

async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "static".to_string());

    let response = next.run(req).await;
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[&method, &endpoint, response.status().as_str()])
        .inc();
    response
}

// ── State handlers ────────────────────────────────────────────────────

async fn get_data(State(state): State<AppState>) -> Response {
    state_response(&state.registry)
}

async fn update_data(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match client_request(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || registry.update(&req.poe_client)).await;
    match result {
        Ok(Ok(_)) => state_response(&state.registry),
        Ok(Err(e)) => tracker_error(e),
        Err(e) => internal_error(e),
    }
}

async fn reset_data(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match client_request(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || registry.reset(&req.poe_client)).await;
    match result {
        Ok(Ok(_)) => state_response(&state.registry),
        Ok(Err(e)) => tracker_error(e),
        Err(e) => internal_error(e),
    }
}

// ── Note listing ──────────────────────────────────────────────────────

async fn list_notes(State(state): State<AppState>) -> Response {
    let mut entries = match tokio::fs::read_dir(&state.notes_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to list notes in {}: {e}", state.notes_dir.display());
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list notes")
                .into_response();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                paths.push(format!("/notes/{}", entry.file_name().to_string_lossy()));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Stopped listing notes: {e}");
                break;
            }
        }
    }
    paths.sort();

    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Json(paths),
    )
        .into_response()
}

// ── Service handlers ──────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "acts-overlay" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
