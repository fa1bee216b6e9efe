//! Audit action models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Action {
    pub id: Uuid,
    pub ip_address: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub action_type: String,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub service_account_id: Option<Uuid>,
    pub performed_at: DateTime<Utc>,
}

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    SignIn,
    FailedSignIn,
    SignOut,
    TokenRefresh,
    PasswordChange,
    UserCreate,
    UserDelete,
    ServiceAccountCreate,
    ServiceAccountDelete,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        ActionType::SignIn,
        ActionType::FailedSignIn,
        ActionType::SignOut,
        ActionType::TokenRefresh,
        ActionType::PasswordChange,
        ActionType::UserCreate,
        ActionType::UserDelete,
        ActionType::ServiceAccountCreate,
        ActionType::ServiceAccountDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SignIn => "SIGN_IN",
            ActionType::FailedSignIn => "FAILED_SIGN_IN",
            ActionType::SignOut => "SIGN_OUT",
            ActionType::TokenRefresh => "TOKEN_REFRESH",
            ActionType::PasswordChange => "PASSWORD_CHANGE",
            ActionType::UserCreate => "USER_CREATE",
            ActionType::UserDelete => "USER_DELETE",
            ActionType::ServiceAccountCreate => "SERVICE_ACCOUNT_CREATE",
            ActionType::ServiceAccountDelete => "SERVICE_ACCOUNT_DELETE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown action type: {}", s))
    }
}

/// Who an action is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOwner {
    User(Uuid),
    ServiceAccount(Uuid),
}

impl ActionOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            ActionOwner::User(id) => Some(*id),
            ActionOwner::ServiceAccount(_) => None,
        }
    }

    pub fn service_account_id(&self) -> Option<Uuid> {
        match self {
            ActionOwner::ServiceAccount(id) => Some(*id),
            ActionOwner::User(_) => None,
        }
    }
}

/// Audit listing filters
#[derive(Debug, Default, Deserialize)]
pub struct ActionFilters {
    #[serde(rename = "type")]
    pub action_type: Option<ActionType>,
    pub user_id: Option<Uuid>,
    pub service_account_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ActionFilters {
    pub const DEFAULT_PER_PAGE: i64 = 50;
    pub const MAX_PER_PAGE: i64 = 500;

    /// (limit, offset) clamped to sane bounds
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self
            .per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1) * per_page)
    }
}

/// Paginated action listing
#[derive(Debug, Serialize)]
pub struct ActionPage {
    pub items: Vec<Action>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
