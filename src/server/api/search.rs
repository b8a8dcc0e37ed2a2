//! `GET /api/search?q=` (spec §4.9), backed by (E)/(D)'s FTS5 search.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::server::errors::AppError;
use crate::server::params::SearchParams;
use crate::server::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let hits = tokio::task::spawn_blocking(move || {
        state
            .sessions
            .search_sessions(&params.q, params.limit, params.matches_per_session)
    })
    .await
    .map_err(|e| anyhow::anyhow!("join error: {e}"))??;
    Ok(Json(serde_json::to_value(hits)?))
}
