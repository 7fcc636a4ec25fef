use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, CategoryChanges, Comment, NewCategory, NewComment, NewPost, NewUser, Post,
    PostChanges, PostQuery, User,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Persistence failures, classified so the service layer can tell constraint
/// violations (client errors) from transient infrastructure trouble (retryable).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("foreign key violated: {0}")]
    MissingReference(String),

    /// The datastore could not be reached (pool exhausted, connection dropped).
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back into a model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => {
                        RepositoryError::UniqueViolation(constraint)
                    }
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        RepositoryError::MissingReference(constraint)
                    }
                    _ => RepositoryError::Database(err),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::Corrupt(err.to_string())
            }
            _ => RepositoryError::Database(err),
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract. Services depend on this trait only, so the Postgres
/// implementation and the in-memory one are interchangeable.
///
/// Name lookups (`find_user_by_username`, `find_user_by_email`,
/// `find_category_by_name`) are case-insensitive, matching the uniqueness rule of
/// the schema. Multi-row mutations (`delete_post`, `delete_category`) are atomic.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool>;

    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> RepoResult<Option<Category>>;
    /// Detaches the category's posts (`category_id = NULL`) and deletes the
    /// category in one transaction. Returns false if the category did not exist.
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;

    // --- Posts ---
    async fn list_posts(&self, query: &PostQuery) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> RepoResult<Option<Post>>;
    /// Deletes the post's comments and then the post in one transaction.
    /// Returns false if the post did not exist.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across services.
pub type RepositoryState = Arc<dyn Repository>;
