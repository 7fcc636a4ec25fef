//! Domain services: business rules on top of the repository.
//!
//! Each service receives its collaborators through its constructor and is cheap
//! to clone (every field is an `Arc` or a small value).

pub mod auth;
pub mod categories;
pub mod comments;
pub mod posts;
pub mod uploads;

pub use auth::AuthService;
pub use categories::CategoryService;
pub use comments::CommentService;
pub use posts::PostService;
pub use uploads::UploadService;

use crate::error::ApiError;

/// Runs CPU-heavy work (password hashing) off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
