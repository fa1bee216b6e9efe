//! 用户管理服务

use crate::{
    auth::password::{CodecError, PasswordCodec},
    config::{BootstrapConfig, SecurityConfig},
    error::AppError,
    models::{
        action::{ActionOwner, ActionType},
        principal::{Principal, Team},
        user::{
            normalize_username, ChangePasswordRequest, CreateUserRequest, Provider, Role,
            UpdateUserRequest, User,
        },
    },
    repository::{user_repo::NewUser, TeamRepository, UserRepository},
    services::{access_service::AccessService, audit_service::AuditService},
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct UserService {
    db: PgPool,
    codec: Arc<PasswordCodec>,
    security: SecurityConfig,
    access: Arc<AccessService>,
    audit: Arc<AuditService>,
}

impl UserService {
    pub fn new(
        db: PgPool,
        codec: Arc<PasswordCodec>,
        security: SecurityConfig,
        access: Arc<AccessService>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            db,
            codec,
            security,
            access,
            audit,
        }
    }

    /// 创建本地用户
    pub async fn create(
        &self,
        req: CreateUserRequest,
        actor: &Principal,
        client_ip: &str,
    ) -> Result<User, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        PasswordCodec::validate_password_policy(&req.password, &self.security)?;

        let username = normalize_username(&req.username);
        if username.is_empty() {
            return Err(AppError::validation("Username must not be blank"));
        }

        let password_hash = self.hash(req.password).await?;

        let repo = UserRepository::new(self.db.clone());
        let user = repo
            .create(&NewUser {
                username: &username,
                password_hash: &password_hash,
                first_name: &req.first_name,
                last_name: &req.last_name,
                role: req.role.unwrap_or(Role::User),
                provider: Provider::Local,
                team_id: req.team_id,
            })
            .await?;

        self.audit
            .record(
                client_ip,
                ActionType::UserCreate,
                &format!("user '{}' created", user.username),
                Some(actor.owner()),
            )
            .await;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");

        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        UserRepository::new(self.db.clone()).list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        UserRepository::new(self.db.clone())
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// 更新用户资料（管理员）；可同时重置密码
    pub async fn update(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
        actor: &Principal,
        client_ip: &str,
    ) -> Result<User, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let new_hash = match &req.password {
            Some(password) => {
                PasswordCodec::validate_password_policy(password, &self.security)?;
                Some(self.hash(password.clone()).await?)
            }
            None => None,
        };

        let repo = UserRepository::new(self.db.clone());
        let user = repo
            .update(id, &req, new_hash.as_deref())
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if new_hash.is_some() {
            self.audit
                .record(
                    client_ip,
                    ActionType::PasswordChange,
                    &format!("password of '{}' reset by administrator", user.username),
                    Some(actor.owner()),
                )
                .await;
        }

        Ok(user)
    }

    /// 修改自己的密码，需要提供旧密码
    pub async fn change_password(
        &self,
        user_id: Uuid,
        req: ChangePasswordRequest,
        client_ip: &str,
    ) -> Result<(), AppError> {
        let repo = UserRepository::new(self.db.clone());
        let user = repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        let codec = self.codec.clone();
        let stored = user.password_hash.clone();
        let old_password = req.old_password;
        let verdict = tokio::task::spawn_blocking(move || codec.verify(&old_password, &stored))
            .await
            .map_err(|e| AppError::internal_error(&format!("password verification task failed: {}", e)))?;
        match verdict {
            Ok(()) => {}
            Err(CodecError::Hashing(msg)) => return Err(AppError::Internal(msg)),
            Err(_) => return Err(AppError::validation("Current password is incorrect")),
        }

        PasswordCodec::validate_password_policy(&req.new_password, &self.security)?;
        let new_hash = self.hash(req.new_password).await?;
        repo.update_password(user_id, &new_hash).await?;

        self.audit
            .record(
                client_ip,
                ActionType::PasswordChange,
                "password changed",
                Some(ActionOwner::User(user_id)),
            )
            .await;
        info!(user_id = %user_id, "Password changed");

        Ok(())
    }

    /// 删除用户；最后一个管理员不可删除
    pub async fn delete(&self, id: Uuid, actor: &Principal, client_ip: &str) -> Result<(), AppError> {
        let repo = UserRepository::new(self.db.clone());
        let user = repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if !repo.delete(id).await? {
            return Err(AppError::not_found("user"));
        }

        self.audit
            .record(
                client_ip,
                ActionType::UserDelete,
                &format!("user '{}' deleted", user.username),
                Some(actor.owner()),
            )
            .await;
        info!(user_id = %id, username = %user.username, "User deleted");

        Ok(())
    }

    /// 团队成员列表，受访问授权保护
    pub async fn team_members(
        &self,
        team_id: Uuid,
        actor: &Principal,
    ) -> Result<(Team, Vec<User>), AppError> {
        let team = TeamRepository::new(self.db.clone())
            .find_by_id(team_id)
            .await?
            .ok_or_else(|| AppError::not_found("team"))?;

        self.access.require_access(actor, &team).await?;

        let members = UserRepository::new(self.db.clone())
            .list_by_team(team_id)
            .await?;
        Ok((team, members))
    }

    /// 启动时确保至少存在一个管理员
    pub async fn ensure_default_admin(&self, bootstrap: &BootstrapConfig) -> Result<(), AppError> {
        let repo = UserRepository::new(self.db.clone());
        if repo.count_admins().await? > 0 {
            return Ok(());
        }

        let password = bootstrap
            .admin_password
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationMissing("bootstrap.admin_password".to_string()))?
            .expose_secret()
            .clone();
        PasswordCodec::validate_password_policy(&password, &self.security)?;

        let username = normalize_username(&bootstrap.admin_username);
        let password_hash = self.hash(password).await?;

        let admin = repo
            .create(&NewUser {
                username: &username,
                password_hash: &password_hash,
                first_name: "",
                last_name: "",
                role: Role::Admin,
                provider: Provider::Local,
                team_id: None,
            })
            .await?;

        info!(user_id = %admin.id, username = %admin.username, "Default administrator created");
        Ok(())
    }

    async fn hash(&self, password: String) -> Result<String, AppError> {
        let codec = self.codec.clone();
        let hashed: Result<String, CodecError> =
            tokio::task::spawn_blocking(move || codec.hash(&password))
                .await
                .map_err(|e| AppError::internal_error(&format!("password hashing task failed: {}", e)))?;

        Ok(hashed?)
    }
}
