use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use super::api;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(api::sessions::routes())
        .merge(api::search::routes())
        .merge(api::ws::routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
