use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Browser flow
        .route("/", get(handlers::landing))
        .route("/auth/login", get(handlers::login))
        .route("/auth/callback", get(handlers::callback))
        .route("/sessions/:id", get(handlers::session_page))
        .route("/sessions/:id/recommend", post(handlers::recommend_form))
        .route("/sessions/:id/playlist", post(handlers::playlist_form))
        // JSON API
        .route("/api/sessions/:id", get(handlers::get_session))
        .route(
            "/api/sessions/:id/recommendations",
            post(handlers::create_recommendations),
        )
        .route("/api/sessions/:id/playlist", post(handlers::create_playlist))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
