//! 认证服务：登录、登出、令牌刷新
//! 所有失败对外统一为 InvalidCredentials，具体原因只写入审计记录

use crate::{
    auth::{
        api_key::{verify_secret, ApiCredentials},
        password::{CodecError, PasswordCodec},
        token::{SignedToken, TokenKind},
    },
    error::AppError,
    models::{
        action::{ActionOwner, ActionType},
        auth::{LoginRequest, ServiceLoginRequest},
        session::IssuedServiceSession,
        user::{normalize_username, User},
    },
    repository::{ServiceAccountRepository, UserRepository},
    services::{audit_service::AuditService, session_service::SessionService},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const MSG_USER_UNKNOWN: &str = "user does not exist";
pub const MSG_WRONG_PASSWORD: &str = "wrong password";
pub const MSG_UNREADABLE_HASH: &str = "stored password hash is unreadable";
pub const MSG_MALFORMED_API: &str = "malformed api credentials";
pub const MSG_SERVICE_UNKNOWN: &str = "service account does not exist";
pub const MSG_WRONG_SECRET: &str = "wrong api secret";
pub const MSG_SERVICE_DISABLED: &str = "service account disabled";

pub struct AuthService {
    db: PgPool,
    codec: Arc<PasswordCodec>,
    sessions: Arc<SessionService>,
    audit: Arc<AuditService>,
    /// 以当前参数生成的占位哈希，未知用户登录时用它走一遍完整校验
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        codec: Arc<PasswordCodec>,
        sessions: Arc<SessionService>,
        audit: Arc<AuditService>,
    ) -> Result<Self, AppError> {
        let dummy_hash = codec
            .hash(&uuid::Uuid::new_v4().to_string())
            .map_err(|e| AppError::Internal(format!("Failed to prepare dummy hash: {}", e)))?;

        Ok(Self {
            db,
            codec,
            sessions,
            audit,
            dummy_hash,
        })
    }

    /// 用户登录
    pub async fn login_user(
        &self,
        req: LoginRequest,
        client_ip: &str,
    ) -> Result<(User, SignedToken), AppError> {
        let username = normalize_username(&req.username);
        let user_repo = UserRepository::new(self.db.clone());

        let Some(user) = user_repo.find_local_by_username(&username).await? else {
            // 与密码错误耗时一致
            let _ = self
                .verify_password(req.password, self.dummy_hash.clone())
                .await?;
            return Err(self
                .reject(TokenKind::User, client_ip, MSG_USER_UNKNOWN, None)
                .await);
        };

        let owner = Some(ActionOwner::User(user.id));
        let upgraded_hash = match self
            .verify_password(req.password, user.password_hash.clone())
            .await?
        {
            Ok(upgraded) => upgraded,
            Err(CodecError::Mismatch) => {
                return Err(self
                    .reject(TokenKind::User, client_ip, MSG_WRONG_PASSWORD, owner)
                    .await);
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Stored password hash could not be verified");
                return Err(self
                    .reject(TokenKind::User, client_ip, MSG_UNREADABLE_HASH, owner)
                    .await);
            }
        };

        let signed = self.sessions.issue_user(user.id).await?;

        if let Some(upgraded) = upgraded_hash {
            match user_repo.update_password(user.id, &upgraded).await {
                Ok(_) => info!(
                    user_id = %user.id,
                    algorithm = %self.codec.algorithm(),
                    "Password hash upgraded"
                ),
                Err(e) => warn!(
                    user_id = %user.id,
                    error = %e,
                    "Failed to store upgraded password hash"
                ),
            }
        }

        self.audit
            .record(client_ip, ActionType::SignIn, "user signed in", owner)
            .await;
        metrics::counter!("auth_logins_total", "kind" => "user", "result" => "success")
            .increment(1);
        info!(user_id = %user.id, username = %user.username, "User logged in");

        Ok((user, signed))
    }

    /// 服务账号登录
    pub async fn login_service(
        &self,
        req: ServiceLoginRequest,
        client_ip: &str,
    ) -> Result<IssuedServiceSession, AppError> {
        let Some(credentials) = ApiCredentials::parse(&req.api_key, &req.api_secret) else {
            return Err(self
                .reject(TokenKind::Service, client_ip, MSG_MALFORMED_API, None)
                .await);
        };

        let repo = ServiceAccountRepository::new(self.db.clone());
        let Some(account) = repo.find_by_api_key(credentials.api_key).await? else {
            return Err(self
                .reject(TokenKind::Service, client_ip, MSG_SERVICE_UNKNOWN, None)
                .await);
        };

        let owner = Some(ActionOwner::ServiceAccount(account.id));
        if !verify_secret(&credentials.api_secret, &account.api_secret_hash) {
            return Err(self
                .reject(TokenKind::Service, client_ip, MSG_WRONG_SECRET, owner)
                .await);
        }

        if !account.active {
            return Err(self
                .reject(TokenKind::Service, client_ip, MSG_SERVICE_DISABLED, owner)
                .await);
        }

        let issued = self.sessions.issue_service(account.id).await?;

        self.audit
            .record(client_ip, ActionType::SignIn, "service account signed in", owner)
            .await;
        metrics::counter!("auth_logins_total", "kind" => "service", "result" => "success")
            .increment(1);
        info!(service_account_id = %account.id, name = %account.name, "Service account logged in");

        Ok(issued)
    }

    /// 兑换刷新令牌
    pub async fn refresh_service(
        &self,
        refresh_token: &str,
        client_ip: &str,
    ) -> Result<IssuedServiceSession, AppError> {
        match self.sessions.refresh(refresh_token).await {
            Ok((issued, account_id)) => {
                self.audit
                    .record(
                        client_ip,
                        ActionType::TokenRefresh,
                        "service session refreshed",
                        Some(ActionOwner::ServiceAccount(account_id)),
                    )
                    .await;
                Ok(issued)
            }
            Err(AppError::InvalidCredentials) => {
                self.audit
                    .record(
                        client_ip,
                        ActionType::TokenRefresh,
                        "refresh token rejected",
                        None,
                    )
                    .await;
                Err(AppError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    /// 登出：过期令牌同样可以登出，重复登出不报错
    pub async fn logout(
        &self,
        token: &str,
        kind: TokenKind,
        client_ip: &str,
    ) -> Result<(), AppError> {
        let claims = self.sessions.revoke(token, kind).await?;

        let (owner, message) = match kind {
            TokenKind::User => (ActionOwner::User(claims.sub), "user signed out"),
            TokenKind::Service => (
                ActionOwner::ServiceAccount(claims.sub),
                "service account signed out",
            ),
        };

        self.audit
            .record(client_ip, ActionType::SignOut, message, Some(owner))
            .await;
        info!(subject = %claims.sub, kind = ?kind, "Logged out");

        Ok(())
    }

    /// Verify on the blocking pool. On success, also produce a replacement
    /// hash when the stored one uses outdated settings. The outer error is
    /// infrastructure, the inner one the verdict.
    async fn verify_password(
        &self,
        password: String,
        stored_hash: String,
    ) -> Result<Result<Option<String>, CodecError>, AppError> {
        let codec = self.codec.clone();

        tokio::task::spawn_blocking(move || {
            codec.verify(&password, &stored_hash)?;

            if !codec.needs_rehash(&stored_hash) {
                return Ok(None);
            }
            match codec.hash(&password) {
                Ok(upgraded) => Ok(Some(upgraded)),
                Err(e) => {
                    warn!(error = %e, "Password rehash failed");
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| AppError::internal_error(&format!("password verification task failed: {}", e)))
    }

    async fn reject(
        &self,
        kind: TokenKind,
        client_ip: &str,
        reason: &'static str,
        owner: Option<ActionOwner>,
    ) -> AppError {
        let kind_label = match kind {
            TokenKind::User => "user",
            TokenKind::Service => "service",
        };

        warn!(kind = kind_label, ip = %client_ip, reason, "Login rejected");
        metrics::counter!("auth_logins_total", "kind" => kind_label, "result" => "failure")
            .increment(1);
        self.audit
            .record(client_ip, ActionType::FailedSignIn, reason, owner)
            .await;

        AppError::InvalidCredentials
    }
}
