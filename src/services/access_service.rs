//! 访问授权服务
//! 管理员直接放行；普通用户仅可访问所属团队的资源；服务账号没有团队

use crate::{
    error::AppError,
    models::{
        principal::{Principal, TeamOwned},
        user::Role,
    },
    repository::user_repo::UserRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

pub struct AccessService {
    db: PgPool,
}

impl AccessService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 检查主体能否操作资源；角色与团队从存储中重新读取
    pub async fn can_access<R: TeamOwned + ?Sized>(
        &self,
        principal: &Principal,
        resource: &R,
    ) -> Result<bool, AppError> {
        let user_id = match principal {
            Principal::User(user) => user.id,
            Principal::Service(_) => return Ok(false),
        };

        let user_repo = UserRepository::new(self.db.clone());
        let Some(user) = user_repo.find_by_id(user_id).await? else {
            return Ok(false);
        };

        Ok(decide(user.role(), user.team_id, resource.owning_team()))
    }

    /// 检查访问权限，无权限则返回错误
    pub async fn require_access<R: TeamOwned + ?Sized>(
        &self,
        principal: &Principal,
        resource: &R,
    ) -> Result<(), AppError> {
        if !self.can_access(principal, resource).await? {
            tracing::warn!(
                principal_id = %principal.id(),
                resource_team = ?resource.owning_team(),
                "Access denied"
            );
            return Err(AppError::AuthorizationDenied);
        }

        Ok(())
    }

    /// 仅管理员可用的操作
    pub async fn require_admin(&self, principal: &Principal) -> Result<(), AppError> {
        let is_admin = match principal {
            Principal::User(user) => UserRepository::new(self.db.clone())
                .find_by_id(user.id)
                .await?
                .is_some_and(|u| u.is_admin()),
            Principal::Service(_) => false,
        };

        if !is_admin {
            tracing::warn!(principal_id = %principal.id(), "Administrator required");
            return Err(AppError::AuthorizationDenied);
        }

        Ok(())
    }
}

/// 授权判定：管理员放行，否则要求双方团队都存在且相同
pub fn decide(role: Role, user_team: Option<Uuid>, resource_team: Option<Uuid>) -> bool {
    match role {
        Role::Admin => true,
        Role::User => matches!((user_team, resource_team), (Some(a), Some(b)) if a == b),
    }
}
