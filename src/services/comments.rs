use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{Comment, CreateCommentRequest, NewComment, Post},
    policy::{self, Action},
    repository::RepositoryState,
    validation::{self, MAX_COMMENT_LEN},
};

/// CommentService
///
/// Comments inherit the visibility of their post: nobody can read or add
/// comments on a draft they are not allowed to see.
#[derive(Clone)]
pub struct CommentService {
    repo: RepositoryState,
}

impl CommentService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list(&self, viewer: Option<&AuthUser>, post_id: i64) -> ApiResult<Vec<Comment>> {
        self.visible_post(viewer, post_id).await?;
        Ok(self.repo.list_comments(post_id).await?)
    }

    pub async fn create(
        &self,
        actor: &AuthUser,
        post_id: i64,
        req: CreateCommentRequest,
    ) -> ApiResult<Comment> {
        policy::authorize(actor, Action::CreateComment, None)?;
        let content = validation::text("content", &req.content, MAX_COMMENT_LEN)?;

        self.visible_post(Some(actor), post_id).await?;

        let comment = self
            .repo
            .create_comment(NewComment {
                post_id,
                author_id: actor.id,
                content,
            })
            .await?;
        tracing::info!(comment_id = comment.id, post_id, author_id = %actor.id, "comment created");
        Ok(comment)
    }

    pub async fn delete(&self, actor: &AuthUser, id: i64) -> ApiResult<()> {
        let comment = self
            .repo
            .get_comment(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("comment {id} not found")))?;

        policy::authorize(actor, Action::DeleteComment, Some(comment.author_id))?;

        if !self.repo.delete_comment(id).await? {
            return Err(ApiError::NotFound(format!("comment {id} not found")));
        }
        tracing::info!(comment_id = id, user_id = %actor.id, "comment deleted");
        Ok(())
    }

    async fn visible_post(&self, viewer: Option<&AuthUser>, post_id: i64) -> ApiResult<Post> {
        match self.repo.get_post(post_id).await? {
            Some(post) if policy::can_view(&post, viewer) => Ok(post),
            _ => Err(ApiError::NotFound(format!("post {post_id} not found"))),
        }
    }
}
