use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, models::Role};

/// Claims
///
/// The payload signed into every JWT issued by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Role at the time of issue; drives RBAC without a database lookup.
    pub role: Role,
    /// Access tokens open protected routes; refresh tokens only mint new access tokens.
    pub kind: TokenKind,
    /// Unique token id, so two tokens issued in the same second still differ.
    pub jti: Uuid,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A freshly signed token together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// TokenService
///
/// Issues and validates HS256 tokens with the server-held secret. Cheap to clone;
/// shared through `AppState` and pulled by the `AuthUser` extractor.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn issue_access(&self, user_id: Uuid, role: Role) -> Result<IssuedToken, ApiError> {
        self.issue(user_id, role, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, user_id: Uuid, role: Role) -> Result<IssuedToken, ApiError> {
        self.issue(user_id, role, TokenKind::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        let now = Utc::now().timestamp();
        let exp = now + ttl.num_seconds();

        let claims = Claims {
            sub: user_id,
            role,
            kind,
            jti: Uuid::new_v4(),
            iat: now as usize,
            exp: exp as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

        // The reported expiry is exactly what the token carries (second precision).
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| ApiError::Internal("token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Checks signature, expiry (zero leeway) and token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(match e.kind() {
                    ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                    _ => ApiError::Unauthenticated("invalid authentication token".to_string()),
                });
            }
        };

        if claims.kind != expected {
            return Err(ApiError::Unauthenticated(
                "token cannot be used for this operation".to_string(),
            ));
        }
        Ok(claims)
    }
}
