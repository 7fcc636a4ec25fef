use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Registration, token endpoints and all read-only content. Visibility of
/// unpublished posts is decided by the post service from the optional caller
/// identity, never by the route.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Authentication ---
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh))
        // GET /api/posts?published=&categoryId=&authorId=&page=&size=&sortBy=&sortDir=
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/posts/{id}", get(handlers::get_post))
        // Comments of a post the caller may see, oldest first.
        .route("/api/posts/{id}/comments", get(handlers::list_comments))
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/categories/{id}", get(handlers::get_category))
}
