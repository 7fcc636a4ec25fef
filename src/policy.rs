//! Role and ownership rules for every mutating operation.

use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, models::Post};

/// Operations gated by the authorization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePost,
    UpdatePost,
    DeletePost,
    ManageCategories,
    CreateComment,
    DeleteComment,
}

/// What an authenticated caller must additionally satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    OwnerOrAdmin,
    Admin,
}

impl Action {
    /// The static table. Reads are public and never reach this function.
    pub const fn requirement(self) -> Requirement {
        match self {
            Action::CreatePost | Action::CreateComment => Requirement::Authenticated,
            Action::UpdatePost | Action::DeletePost | Action::DeleteComment => {
                Requirement::OwnerOrAdmin
            }
            Action::ManageCategories => Requirement::Admin,
        }
    }
}

/// authorize
///
/// `owner` is the author of the target resource for ownership-gated actions.
/// Fails with `Forbidden`; authentication itself was settled by the extractor.
pub fn authorize(actor: &AuthUser, action: Action, owner: Option<Uuid>) -> Result<(), ApiError> {
    let allowed = match action.requirement() {
        Requirement::Authenticated => true,
        Requirement::OwnerOrAdmin => actor.is_admin() || owner == Some(actor.id),
        Requirement::Admin => actor.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        tracing::info!(user_id = %actor.id, ?action, "authorization denied");
        Err(ApiError::Forbidden(match action.requirement() {
            Requirement::Admin => "administrator role required".to_string(),
            _ => "only the author or an administrator may do this".to_string(),
        }))
    }
}

/// Drafts are visible to their author and to admins only.
pub fn can_view(post: &Post, viewer: Option<&AuthUser>) -> bool {
    post.published
        || viewer.is_some_and(|user| user.is_admin() || user.id == post.author_id)
}
