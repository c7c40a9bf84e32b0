pub mod auth;
pub mod categories;
pub mod items;
pub mod rentals;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface: `/health` plus the JSON API under `/api`.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(items::router())
        .merge(rentals::router())
        .merge(categories::router());

    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
