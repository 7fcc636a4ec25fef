//! Shared harness: the real router over the in-memory repository and mock storage.
#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use blog_api::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router, models::Role,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
}

/// A signed-in account for driving requests.
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(MockStorageService::new(), AppConfig::default())
}

pub fn spawn_app_with(storage: MockStorageService, config: AppConfig) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone(), Arc::new(storage.clone()), config);
    let router = create_router(state.clone());
    TestApp {
        router,
        state,
        repo,
        storage,
    }
}

impl TestApp {
    /// Sends a JSON request and returns the status and the parsed body
    /// (`Value::Null` for empty bodies).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, username: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            }),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Registers and logs in a `USER`.
    pub async fn user(&self, username: &str) -> TestUser {
        let (status, profile) = self.register(username).await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {profile}");
        let id: Uuid = serde_json::from_value(profile["id"].clone()).unwrap();
        self.sign_in(id, username).await
    }

    /// Registers an account, promotes it to `ADMIN` and logs in so the token
    /// carries the admin role.
    pub async fn admin(&self, username: &str) -> TestUser {
        let (status, profile) = self.register(username).await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {profile}");
        let id: Uuid = serde_json::from_value(profile["id"].clone()).unwrap();
        assert!(self.repo.set_role(id, Role::Admin).await);
        self.sign_in(id, username).await
    }

    async fn sign_in(&self, id: Uuid, username: &str) -> TestUser {
        let (status, tokens) = self.login(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login {username}: {tokens}");
        TestUser {
            id,
            username: username.to_string(),
            access_token: tokens["accessToken"].as_str().unwrap().to_string(),
            refresh_token: tokens["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_category(&self, admin: &TestUser, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/categories",
                Some(&admin.access_token),
                json!({ "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create category: {body}");
        body
    }

    pub async fn create_post(&self, author: &TestUser, body: Value) -> Value {
        let (status, post) = self
            .post("/api/posts", Some(&author.access_token), body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post: {post}");
        post
    }
}
