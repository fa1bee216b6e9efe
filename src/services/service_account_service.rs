//! 服务账号管理服务

use crate::{
    auth::api_key::{hash_secret, ApiCredentials},
    error::AppError,
    models::{
        action::ActionType,
        principal::Principal,
        service_account::{CreateServiceAccountRequest, CreatedServiceAccount, ServiceAccount},
    },
    repository::ServiceAccountRepository,
    services::audit_service::AuditService,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct ServiceAccountService {
    db: PgPool,
    audit: Arc<AuditService>,
}

impl ServiceAccountService {
    pub fn new(db: PgPool, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    /// 创建服务账号；API secret 只在此处返回一次
    pub async fn create(
        &self,
        req: CreateServiceAccountRequest,
        actor: &Principal,
        client_ip: &str,
    ) -> Result<CreatedServiceAccount, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let credentials = ApiCredentials::generate();
        let repo = ServiceAccountRepository::new(self.db.clone());
        let account = repo
            .create(
                req.name.trim(),
                credentials.api_key,
                &hash_secret(&credentials.api_secret),
            )
            .await?;

        self.audit
            .record(
                client_ip,
                ActionType::ServiceAccountCreate,
                &format!("service account '{}' created", account.name),
                Some(actor.owner()),
            )
            .await;
        info!(service_account_id = %account.id, name = %account.name, "Service account created");

        Ok(CreatedServiceAccount {
            account: account.into(),
            api_secret: credentials.api_secret,
        })
    }

    pub async fn list(&self) -> Result<Vec<ServiceAccount>, AppError> {
        ServiceAccountRepository::new(self.db.clone()).list().await
    }

    /// 启用/禁用；禁用后现有会话随即失效
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<ServiceAccount, AppError> {
        let account = ServiceAccountRepository::new(self.db.clone())
            .set_active(id, active)
            .await?
            .ok_or_else(|| AppError::not_found("service account"))?;

        info!(service_account_id = %id, active, "Service account status changed");
        Ok(account)
    }

    pub async fn delete(&self, id: Uuid, actor: &Principal, client_ip: &str) -> Result<(), AppError> {
        let repo = ServiceAccountRepository::new(self.db.clone());
        let account = repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("service account"))?;

        if !repo.delete(id).await? {
            return Err(AppError::not_found("service account"));
        }

        self.audit
            .record(
                client_ip,
                ActionType::ServiceAccountDelete,
                &format!("service account '{}' deleted", account.name),
                Some(actor.owner()),
            )
            .await;
        info!(service_account_id = %id, "Service account deleted");

        Ok(())
    }
}
