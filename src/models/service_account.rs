//! Service account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Machine principal. `api_key` acts as the username, the secret as the password.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceAccount {
    pub id: Uuid,
    pub name: String,
    pub api_key: Uuid,
    /// SHA-256 hex digest of the API secret
    #[serde(skip_serializing)]
    pub api_secret_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create service account request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceAccountRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Enable / disable request
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// Service account response (without secrets)
#[derive(Debug, Serialize)]
pub struct ServiceAccountResponse {
    pub id: Uuid,
    pub name: String,
    pub api_key: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ServiceAccount> for ServiceAccountResponse {
    fn from(account: ServiceAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            api_key: account.api_key,
            active: account.active,
            created_at: account.created_at,
        }
    }
}

/// Returned once at creation; the secret is never retrievable again
#[derive(Debug, Serialize)]
pub struct CreatedServiceAccount {
    #[serde(flatten)]
    pub account: ServiceAccountResponse,
    pub api_secret: Uuid,
}
