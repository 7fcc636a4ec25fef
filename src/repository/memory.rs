use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering as AtomicOrdering},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Category, CategoryChanges, Comment, NewCategory, NewComment, NewPost, NewUser, Post,
    PostChanges, PostQuery, PostSort, SortDirection, User, Visibility,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    categories: BTreeMap<i64, Category>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    next_category_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn check_post_references(&self, category_id: Option<i64>, author_id: Uuid) -> RepoResult<()> {
        if let Some(category_id) = category_id {
            if !self.categories.contains_key(&category_id) {
                return Err(RepositoryError::MissingReference(
                    "posts_category_id_fkey".to_string(),
                ));
            }
        }
        if !self.users.contains_key(&author_id) {
            return Err(RepositoryError::MissingReference(
                "posts_author_id_fkey".to_string(),
            ));
        }
        Ok(())
    }

    fn category_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.categories
            .values()
            .any(|c| Some(c.id) != except && same_text(&c.name, name))
    }
}

/// Case-insensitive equality with the Unicode folding of Postgres `LOWER()`.
fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// InMemoryRepository
///
/// A complete `Repository` kept in process memory behind one async mutex, so every
/// operation (including the multi-row deletes) is atomic. It enforces the same
/// case-insensitive uniqueness and foreign-key rules as the Postgres schema.
/// Used by the test suite and for running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a dropped datastore: every call fails with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Sets a user's role directly, bypassing the API (there is no endpoint for it).
    pub async fn set_role(&self, user_id: Uuid, role: crate::models::Role) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    fn ensure_available(&self) -> RepoResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn compare_posts(a: &Post, b: &Post, sort_by: PostSort) -> Ordering {
    let primary = match sort_by {
        PostSort::CreatedAt => a.created_at.cmp(&b.created_at),
        PostSort::Title => a.title.cmp(&b.title),
        PostSort::Id => Ordering::Equal,
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .values()
            .any(|u| same_text(&u.username, &user.username))
        {
            return Err(RepositoryError::UniqueViolation("users_username_key".to_string()));
        }
        if tables
            .users
            .values()
            .any(|u| same_text(&u.email, &user.email))
        {
            return Err(RepositoryError::UniqueViolation("users_email_key".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| same_text(&u.username, username))
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| same_text(&u.email, email))
            .cloned())
    }

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .categories
            .values()
            .find(|c| same_text(&c.name, name))
            .cloned())
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if tables.category_name_taken(&category.name, None) {
            return Err(RepositoryError::UniqueViolation("categories_name_key".to_string()));
        }

        let now = Utc::now();
        let created = Category {
            id: Tables::next_id(&mut tables.next_category_id),
            name: category.name,
            description: category.description,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_category(
        &self,
        id: i64,
        changes: CategoryChanges,
    ) -> RepoResult<Option<Category>> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if let Some(name) = &changes.name {
            if tables.category_name_taken(name, Some(id)) {
                return Err(RepositoryError::UniqueViolation("categories_name_key".to_string()));
            }
        }

        let Some(category) = tables.categories.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            category.name = name;
        }
        if let Some(description) = changes.description {
            category.description = description;
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
                post.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn list_posts(&self, query: &PostQuery) -> RepoResult<Vec<Post>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| match query.visibility {
                Visibility::Public => p.published,
                Visibility::Author(author_id) => p.published || p.author_id == author_id,
                Visibility::Everything => true,
            })
            .filter(|p| query.published.is_none_or(|published| p.published == published))
            .filter(|p| query.category_id.is_none_or(|id| p.category_id == Some(id)))
            .filter(|p| query.author_id.is_none_or(|id| p.author_id == id))
            .cloned()
            .collect();

        posts.sort_by(|a, b| {
            let ordering = compare_posts(a, b, query.sort_by);
            match query.sort_dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        Ok(posts
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.posts.get(&id).cloned())
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;
        tables.check_post_references(post.category_id, post.author_id)?;

        let now = Utc::now();
        let created = Post {
            id: Tables::next_id(&mut tables.next_post_id),
            title: post.title,
            content: post.content,
            category_id: post.category_id,
            author_id: post.author_id,
            image_url: post.image_url,
            published: post.published,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> RepoResult<Option<Post>> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if let Some(Some(category_id)) = changes.category_id {
            if !tables.categories.contains_key(&category_id) {
                return Err(RepositoryError::MissingReference(
                    "posts_category_id_fkey".to_string(),
                ));
            }
        }

        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(category_id) = changes.category_id {
            post.category_id = category_id;
        }
        if let Some(image_url) = changes.image_url {
            post.image_url = image_url;
        }
        if let Some(published) = changes.published {
            post.published = published;
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }

    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        self.ensure_available()?;
        let tables = self.tables.lock().await;
        // BTreeMap order is id order, which is insertion order.
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.comments.get(&id).cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        self.ensure_available()?;
        let mut tables = self.tables.lock().await;

        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepositoryError::MissingReference(
                "comments_post_id_fkey".to_string(),
            ));
        }
        if !tables.users.contains_key(&comment.author_id) {
            return Err(RepositoryError::MissingReference(
                "comments_author_id_fkey".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Comment {
            id: Tables::next_id(&mut tables.next_comment_id),
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.comments.remove(&id).is_some())
    }
}
