pub mod routes;

use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// All HTTP routes. The rendering client is served separately; CORS is open
/// so it can call in from any origin.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/price", get(routes::get_price))
        .route("/api/grid", get(routes::get_grid))
        .route("/api/quote/{ticker}", get(routes::get_quote))
        .route("/api/dashboard", get(routes::get_dashboard))
        .route("/api/counters", get(routes::get_counters))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
