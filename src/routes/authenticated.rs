use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Multipart framing around the file itself (boundaries, part headers).
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer applied in
/// `create_router`. Ownership (author or admin) is checked by the services
/// against the stored author of the post or comment.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        .route("/api/users/me", get(handlers::get_me))
        .route("/api/users/me/password", put(handlers::change_password))
        // --- Posts ---
        .route("/api/posts", post(handlers::create_post))
        // PUT/DELETE /api/posts/{id}
        // Author or admin. Deleting a post removes its comments in the same transaction.
        .route(
            "/api/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // --- Comments ---
        .route("/api/posts/{id}/comments", post(handlers::create_comment))
        .route("/api/comments/{id}", delete(handlers::delete_comment))
        // POST /api/uploads/image
        // The body limit sits slightly above the file limit so that oversize files
        // reach the upload service and get its validation error.
        .route(
            "/api/uploads/image",
            post(handlers::upload_image)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
        )
}
