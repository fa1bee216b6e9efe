//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,

    pub role: String,     // USER, ADMIN
    pub provider: String, // LOCAL, FEDERATED

    pub team_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from(self.role.clone())
    }

    pub fn provider(&self) -> Provider {
        Provider::from(self.provider.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

/// User role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

// Unknown values fall back to the least privileged role
impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Where the account's credentials live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Local,
    Federated,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "LOCAL",
            Provider::Federated => "FEDERATED",
        }
    }
}

impl From<String> for Provider {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "LOCAL" => Provider::Local,
            _ => Provider::Federated,
        }
    }
}

/// Usernames are stored and compared lowercase
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    pub password: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 128))]
    #[serde(default)]
    pub last_name: String,
    pub role: Option<Role>,
    pub team_id: Option<Uuid>,
}

/// Update user request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 128))]
    pub first_name: Option<String>,
    #[validate(length(max = 128))]
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub team_id: Option<Uuid>,
    /// Reset the password (administrator action)
    pub password: Option<String>,
}

/// Change own password request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// User response (without sensitive data)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub provider: Provider,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.role(),
            provider: user.provider(),
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            team_id: user.team_id,
            created_at: user.created_at,
        }
    }
}
