use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{
        CreatePostRequest, NewPost, Post, PostChanges, PostFilter, PostQuery, UpdatePostRequest,
        Visibility,
    },
    policy::{self, Action},
    repository::RepositoryState,
    storage::StorageState,
    services::uploads,
    validation::{self, MAX_CONTENT_LEN, MAX_TITLE_LEN},
};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// PostService
///
/// Post lifecycle: drafts by default, visible to their author and admins until
/// published, editable and deletable by the author or an admin.
#[derive(Clone)]
pub struct PostService {
    repo: RepositoryState,
    storage: StorageState,
}

impl PostService {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self { repo, storage }
    }

    /// list
    ///
    /// Anonymous callers see published posts; signed-in callers also see their own
    /// drafts; admins see everything. Filters narrow within that set.
    pub async fn list(&self, viewer: Option<&AuthUser>, filter: PostFilter) -> ApiResult<Vec<Post>> {
        let size = filter.size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(ApiError::Validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let page = filter.page.unwrap_or(0);
        if page < 0 {
            return Err(ApiError::Validation("page must not be negative".to_string()));
        }

        let visibility = match viewer {
            None => Visibility::Public,
            Some(user) if user.is_admin() => Visibility::Everything,
            Some(user) => Visibility::Author(user.id),
        };

        let query = PostQuery {
            visibility,
            published: filter.published,
            category_id: filter.category_id,
            author_id: filter.author_id,
            sort_by: filter.sort_by.unwrap_or_default(),
            sort_dir: filter.sort_dir.unwrap_or_default(),
            limit: size,
            offset: page.saturating_mul(size),
        };
        Ok(self.repo.list_posts(&query).await?)
    }

    /// get
    ///
    /// Drafts the viewer may not see are reported as missing, not forbidden.
    pub async fn get(&self, viewer: Option<&AuthUser>, id: i64) -> ApiResult<Post> {
        let post = self.find(id).await?;
        if !policy::can_view(&post, viewer) {
            return Err(not_found(id));
        }
        Ok(post)
    }

    pub async fn create(&self, actor: &AuthUser, req: CreatePostRequest) -> ApiResult<Post> {
        policy::authorize(actor, Action::CreatePost, None)?;

        let title = validation::text("title", &req.title, MAX_TITLE_LEN)?;
        let content = validation::text("content", &req.content, MAX_CONTENT_LEN)?;
        if let Some(url) = &req.image_url {
            validation::image_url(url)?;
        }

        if self.repo.get_user(actor.id).await?.is_none() {
            return Err(ApiError::NotFound("author account not found".to_string()));
        }
        if let Some(category_id) = req.category_id {
            self.ensure_category(category_id).await?;
        }

        let post = self
            .repo
            .create_post(NewPost {
                title,
                content,
                category_id: req.category_id,
                author_id: actor.id,
                image_url: req.image_url,
                published: req.published.unwrap_or(false),
            })
            .await?;
        tracing::info!(post_id = post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    /// update
    ///
    /// Partial update by the author or an admin. Replacing the image removes the
    /// previous one from the provider, best-effort.
    pub async fn update(&self, actor: &AuthUser, id: i64, req: UpdatePostRequest) -> ApiResult<Post> {
        let existing = self.find(id).await?;
        policy::authorize(actor, Action::UpdatePost, Some(existing.author_id))?;

        let title = req
            .title
            .as_deref()
            .map(|t| validation::text("title", t, MAX_TITLE_LEN))
            .transpose()?;
        let content = req
            .content
            .as_deref()
            .map(|c| validation::text("content", c, MAX_CONTENT_LEN))
            .transpose()?;
        if let Some(Some(url)) = &req.image_url {
            validation::image_url(url)?;
        }
        if let Some(Some(category_id)) = req.category_id {
            self.ensure_category(category_id).await?;
        }

        let replaced_image = match (&existing.image_url, &req.image_url) {
            (Some(old), Some(new)) if new.as_ref() != Some(old) => Some(old.clone()),
            _ => None,
        };

        let post = self
            .repo
            .update_post(
                id,
                PostChanges {
                    title,
                    content,
                    category_id: req.category_id,
                    image_url: req.image_url,
                    published: req.published,
                },
            )
            .await?
            .ok_or_else(|| not_found(id))?;

        if let Some(old) = replaced_image {
            self.discard_image(existing.author_id, &old).await;
        }
        tracing::info!(post_id = id, user_id = %actor.id, "post updated");
        Ok(post)
    }

    /// delete
    ///
    /// Removes the post and its comments atomically, then its image best-effort.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> ApiResult<()> {
        let existing = self.find(id).await?;
        policy::authorize(actor, Action::DeletePost, Some(existing.author_id))?;

        if !self.repo.delete_post(id).await? {
            return Err(not_found(id));
        }
        if let Some(url) = &existing.image_url {
            self.discard_image(existing.author_id, url).await;
        }
        tracing::info!(post_id = id, user_id = %actor.id, "post deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> ApiResult<Post> {
        self.repo.get_post(id).await?.ok_or_else(|| not_found(id))
    }

    async fn ensure_category(&self, category_id: i64) -> ApiResult<()> {
        validation::positive_id("categoryId", category_id)?;
        match self.repo.get_category(category_id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound(format!(
                "category {category_id} not found"
            ))),
        }
    }

    /// Removes an image the post no longer uses, best-effort. Only uploads stored
    /// under the post author's prefix are deleted; a post may reference anyone's
    /// image or an external URL, and those are left alone.
    async fn discard_image(&self, author_id: Uuid, url: &str) {
        let prefix = uploads::owner_prefix(author_id);
        let owned = self
            .storage
            .key_of(url)
            .is_some_and(|key| key.starts_with(&prefix));
        if !owned {
            tracing::debug!(url, %author_id, "image not uploaded by the post author, keeping it");
            return;
        }

        if let Err(e) = self.storage.delete_object(url).await {
            tracing::warn!(url, error = %e, "failed to delete image from provider");
        }
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("post {id} not found"))
}
