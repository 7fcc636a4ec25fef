use uuid::Uuid;

use super::blocking;
use crate::{
    auth::{TokenKind, TokenService, password},
    config::AdminSeed,
    error::{ApiError, ApiResult},
    models::{
        AccessTokenResponse, ChangePasswordRequest, LoginRequest, NewUser, RegisterRequest, Role,
        TokenResponse, User, UserProfile,
    },
    repository::RepositoryState,
    validation,
};

const TOKEN_TYPE: &str = "Bearer";

/// AuthService
///
/// Registration, credential checks and token issuance. Plaintext passwords only
/// ever live in request memory; they are hashed on a blocking thread and never logged.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(repo: RepositoryState, tokens: TokenService) -> Self {
        Self { repo, tokens }
    }

    /// register
    ///
    /// Creates a `USER` account. Username and email must be unique regardless of
    /// case; the unique indexes back up the pre-checks under concurrent sign-ups.
    pub async fn register(&self, req: RegisterRequest) -> ApiResult<UserProfile> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        validation::username(&username)?;
        validation::email(&email)?;
        validation::password(&req.password)?;

        let user = self.create_account(username, email, req.password, Role::User).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user.into())
    }

    async fn create_account(
        &self,
        username: String,
        email: String,
        password: String,
        role: Role,
    ) -> ApiResult<User> {
        if self.repo.find_user_by_username(&username).await?.is_some() {
            return Err(ApiError::Conflict("username is already taken".to_string()));
        }
        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::Conflict("email is already registered".to_string()));
        }

        let password_hash = blocking(move || password::hash_password(&password)).await?;

        Ok(self
            .repo
            .create_user(NewUser {
                username,
                email,
                password_hash,
                role,
            })
            .await?)
    }

    /// login
    ///
    /// Accepts a username or an email. Every failure is the same
    /// `InvalidCredentials`, and an unknown account still costs one Argon2
    /// verification, so neither the response nor its timing reveals which
    /// usernames exist.
    pub async fn login(&self, req: LoginRequest) -> ApiResult<TokenResponse> {
        let identifier = req.username.trim();
        let user = if identifier.contains('@') {
            self.repo.find_user_by_email(identifier).await?
        } else {
            self.repo.find_user_by_username(identifier).await?
        };

        let Some(user) = user else {
            let password = req.password;
            blocking(move || {
                password::verify_dummy(&password);
                Ok(())
            })
            .await?;
            tracing::info!("login failed: unknown account");
            return Err(ApiError::InvalidCredentials);
        };

        let password = req.password;
        let stored_hash = user.password_hash.clone();
        let matches = blocking(move || password::verify_password(&password, &stored_hash)).await?;
        if !matches {
            tracing::info!(user_id = %user.id, "login failed: wrong password");
            return Err(ApiError::InvalidCredentials);
        }

        let access = self.tokens.issue_access(user.id, user.role)?;
        let refresh = self.tokens.issue_refresh(user.id, user.role)?;
        tracing::info!(user_id = %user.id, "user logged in");

        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// refresh
    ///
    /// Mints a new access token from a valid refresh token. The user is re-read so
    /// the new token carries the current role, and a vanished account is rejected.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<AccessTokenResponse> {
        let claims = self.tokens.verify(refresh_token.trim(), TokenKind::Refresh)?;

        let user = self
            .repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("account no longer exists".to_string()))?;

        let access = self.tokens.issue_access(user.id, user.role)?;
        Ok(AccessTokenResponse {
            access_token: access.token,
            expires_at: access.expires_at,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> ApiResult<UserProfile> {
        self.repo
            .get_user(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))
    }

    /// change_password
    ///
    /// Requires the current password. Tokens already issued stay valid until expiry.
    pub async fn change_password(&self, user_id: Uuid, req: ChangePasswordRequest) -> ApiResult<()> {
        validation::password(&req.new_password)?;

        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

        let current = req.current_password;
        let stored_hash = user.password_hash;
        let matches = blocking(move || password::verify_password(&current, &stored_hash)).await?;
        if !matches {
            return Err(ApiError::InvalidCredentials);
        }

        let new_password = req.new_password;
        let new_hash = blocking(move || password::hash_password(&new_password)).await?;
        if !self.repo.update_user_password(user_id, &new_hash).await? {
            return Err(ApiError::NotFound("user not found".to_string()));
        }
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    /// ensure_admin
    ///
    /// Creates the configured administrator unless the username already exists.
    /// Returns true when an account was created.
    pub async fn ensure_admin(&self, seed: &AdminSeed) -> ApiResult<bool> {
        if self.repo.find_user_by_username(&seed.username).await?.is_some() {
            tracing::debug!(username = %seed.username, "admin account already present");
            return Ok(false);
        }

        validation::username(&seed.username)?;
        validation::email(&seed.email)?;
        validation::password(&seed.password)?;

        let admin = self
            .create_account(
                seed.username.clone(),
                seed.email.clone(),
                seed.password.clone(),
                Role::Admin,
            )
            .await?;
        tracing::info!(user_id = %admin.id, username = %admin.username, "admin account created");
        Ok(true)
    }
}
