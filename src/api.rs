use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResponse};
use crate::render;
use crate::state::AppState;
use crate::types::{FunnelToggled, SnapshotCreated, SnapshotList};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Dashboard
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/status", get(status))
        // Snapshots
        .route("/api/snapshots", get(list_snapshots))
        .route("/api/snapshots/create", post(create_snapshot))
        .route("/api/snapshots/restore", post(restore_snapshot))
        .route("/api/snapshots/delete", post(delete_snapshot))
        // Tunnel
        .route("/api/tailscale/toggle-funnel", post(toggle_funnel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    pub label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

impl FilenameQuery {
    fn required(&self) -> Result<&str, ApiError> {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ApiError::BadRequest("filename is required".into())),
        }
    }
}

// ── Dashboard ──────────────────────────────────────────────────

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let status = state.cache.get().await;
    Html(render::status_page(&status))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "devbox-status",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.cache.get().await;
    Json((*status).clone())
}

// ── Snapshots ──────────────────────────────────────────────────

async fn list_snapshots(State(state): State<Arc<AppState>>) -> Json<SnapshotList> {
    Json(SnapshotList {
        snapshots: state.store.list(),
    })
}

async fn create_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.create(query.label.as_deref()).await?;
    state.cache.invalidate().await;
    Ok(Json(ApiResponse::ok(SnapshotCreated {
        filename: record.filename,
    })))
}

async fn restore_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilenameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.restore(query.required()?).await?;
    state.cache.invalidate().await;
    Ok(Json(ApiResponse::done()))
}

async fn delete_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilenameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete(query.required()?)?;
    state.cache.invalidate().await;
    Ok(Json(ApiResponse::done()))
}

// ── Tunnel ─────────────────────────────────────────────────────

async fn toggle_funnel(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let message = state.tailscale.toggle_funnel().await?;
    state.cache.invalidate().await;
    Ok(Json(ApiResponse::ok(FunnelToggled { message })))
}
