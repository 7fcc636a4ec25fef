use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{Category, CategoryChanges, CreateCategoryRequest, NewCategory, UpdateCategoryRequest},
    policy::{self, Action},
    repository::RepositoryState,
    validation::{self, MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN},
};

/// CategoryService
///
/// Categories are public to read and admin-only to change. Names are unique
/// case-insensitively ("Rust" and "rust" collide).
#[derive(Clone)]
pub struct CategoryService {
    repo: RepositoryState,
}

impl CategoryService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> ApiResult<Vec<Category>> {
        Ok(self.repo.list_categories().await?)
    }

    pub async fn get(&self, id: i64) -> ApiResult<Category> {
        self.repo
            .get_category(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, actor: &AuthUser, req: CreateCategoryRequest) -> ApiResult<Category> {
        policy::authorize(actor, Action::ManageCategories, None)?;

        let name = validation::text("name", &req.name, MAX_CATEGORY_NAME_LEN)?;
        let description =
            validation::optional_text("description", req.description.as_deref(), MAX_DESCRIPTION_LEN)?;

        if self.repo.find_category_by_name(&name).await?.is_some() {
            return Err(duplicate(&name));
        }

        let category = self.repo.create_category(NewCategory { name, description }).await?;
        tracing::info!(category_id = category.id, name = %category.name, "category created");
        Ok(category)
    }

    /// update
    ///
    /// Partial update. A new name is re-checked against every other category.
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: i64,
        req: UpdateCategoryRequest,
    ) -> ApiResult<Category> {
        policy::authorize(actor, Action::ManageCategories, None)?;

        let name = req
            .name
            .as_deref()
            .map(|name| validation::text("name", name, MAX_CATEGORY_NAME_LEN))
            .transpose()?;
        let description = req
            .description
            .as_deref()
            .map(|d| validation::optional_text("description", Some(d), MAX_DESCRIPTION_LEN))
            .transpose()?;

        if self.repo.get_category(id).await?.is_none() {
            return Err(not_found(id));
        }

        if let Some(name) = &name {
            if let Some(existing) = self.repo.find_category_by_name(name).await? {
                if existing.id != id {
                    return Err(duplicate(name));
                }
            }
        }

        self.repo
            .update_category(id, CategoryChanges { name, description })
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// delete
    ///
    /// Posts in the category survive with `categoryId` cleared.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> ApiResult<()> {
        policy::authorize(actor, Action::ManageCategories, None)?;

        if !self.repo.delete_category(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(category_id = id, "category deleted");
        Ok(())
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("category {id} not found"))
}

fn duplicate(name: &str) -> ApiError {
    ApiError::Conflict(format!("category '{name}' already exists"))
}
