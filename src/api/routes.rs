use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::cycle::CycleRunner;
use crate::db::ItemStore;
use crate::error::AppError;
use crate::types::{CycleOutcome, TriggerOrigin, WatchedItem};

#[derive(Clone)]
pub struct ApiState {
    pub store: ItemStore,
    pub runner: Arc<CycleRunner>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/:id", get(get_item).delete(delete_item))
        .route("/scan", post(trigger_scan))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub url: Option<String>,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_items(State(state): State<ApiState>) -> Result<Json<Vec<WatchedItem>>, AppError> {
    let items = state.store.list_items().await?;
    info!("listing {} items", items.len());
    Ok(Json(items))
}

async fn create_item(
    State(state): State<ApiState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<WatchedItem>), AppError> {
    let url = match req.url.as_deref() {
        Some(u) if !u.trim().is_empty() => u.trim(),
        _ => return Err(AppError::BadRequest("url is required".to_string())),
    };
    let item = state.store.create_item(url, &req.description).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<WatchedItem>, AppError> {
    let item = state.store.get_item(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<WatchedItem>, AppError> {
    let item = state.store.delete_item(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(item))
}

/// Run a scan cycle right now. On-demand cycles never install the next
/// scheduled trigger.
async fn trigger_scan(State(state): State<ApiState>) -> Response {
    match state.runner.run(TriggerOrigin::OnDemand).await {
        CycleOutcome::Completed(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": format!(
                    "{} sale items detected and notified",
                    report.sale_items_count,
                ),
                "sale_items_count": report.sale_items_count,
                "processed_items_count": report.processed_items_count,
            })),
        )
            .into_response(),
        CycleOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "message": "a scan is already running — try again later",
            })),
        )
            .into_response(),
        CycleOutcome::Failed(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": msg })),
        )
            .into_response(),
    }
}
