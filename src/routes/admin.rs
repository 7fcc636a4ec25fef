use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Category management. `create_router` wraps this router in the authentication
/// layer and then the admin layer, so a `USER` token gets 403 and a missing
/// token gets 401 before any handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", post(handlers::create_category))
        .route(
            "/api/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
}
