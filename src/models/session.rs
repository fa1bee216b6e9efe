//! Persisted session records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human session row; the token itself is stored as a digest
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSessionToken {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    /// Absolute expiry, epoch seconds
    pub expires_at: i64,
}

/// Service session row with its single-use refresh token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceSessionToken {
    pub id: Uuid,
    pub token_hash: String,
    pub refresh_token_hash: String,
    pub service_account_id: Uuid,
    pub expires_at: i64,
    pub issued_at: i64,
}

/// Values handed back to a service after login or refresh
#[derive(Debug, Clone)]
pub struct IssuedServiceSession {
    pub session_token: String,
    pub refresh_token: Uuid,
    pub expires_at: i64,
}
