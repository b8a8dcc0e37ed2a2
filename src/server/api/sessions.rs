//! `GET /api/sessions`, `/:id`, `/:id/messages`; rename/move/restore
//! (spec §4.9). Grounded on the teacher's `server/api/sessions.rs` handler
//! shape, backed by (E)/(D) instead of raw SQL queries.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::index::ListOptions;
use crate::server::errors::AppError;
use crate::server::params::{MoveBody, RenameBody, SessionListParams};
use crate::server::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/messages", get(get_messages))
        .route("/sessions/{id}/rename", post(rename_session))
        .route("/sessions/{id}/move", post(move_session))
        .route("/sessions/{id}/restore", post(restore_session))
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let opts = ListOptions {
        include_deleted: params.include_deleted,
        project_path: params.project,
    };
    let sessions = tokio::task::spawn_blocking(move || state.store.list(&opts))
        .await
        .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::to_value(sessions)?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = tokio::task::spawn_blocking(move || state.sessions.find_session(&id))
        .await
        .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::to_value(session)?))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let messages = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<crate::models::SessionMessage>> {
        let session = state.sessions.find_session(&id)?;
        let parsed = crate::index::jsonl::parse_file(std::path::Path::new(&session.file_path))?;
        Ok(parsed.messages)
    })
    .await
    .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::to_value(messages)?))
}

async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    tokio::task::spawn_blocking(move || state.sessions.rename_session(&id, &body.title))
        .await
        .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn move_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = tokio::task::spawn_blocking(move || state.sessions.move_session(&id, &body.working_directory))
        .await
        .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::to_value(session)?))
}

async fn restore_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    tokio::task::spawn_blocking(move || state.sessions.restore_deleted(&id, &state.backups))
        .await
        .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::json!({ "ok": true })))
}
