//! Authentication-related models

use super::user::UserResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Human login response; the token travels in the cookie
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub expires_at: i64,
}

/// Service login request. Fields are strings so malformed values are
/// rejected as bad credentials rather than as a bad request.
#[derive(Debug, Deserialize)]
pub struct ServiceLoginRequest {
    pub api_key: String,
    pub api_secret: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Service session response
#[derive(Debug, Serialize)]
pub struct ServiceTokenResponse {
    pub session_token: String,
    pub refresh_token: Uuid,
    pub expires_at: i64,
}

impl From<super::session::IssuedServiceSession> for ServiceTokenResponse {
    fn from(issued: super::session::IssuedServiceSession) -> Self {
        Self {
            session_token: issued.session_token,
            refresh_token: issued.refresh_token,
            expires_at: issued.expires_at,
        }
    }
}
