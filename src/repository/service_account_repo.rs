//! Service account repository

use crate::{error::AppError, models::service_account::ServiceAccount};
use sqlx::PgPool;
use uuid::Uuid;

pub struct ServiceAccountRepository {
    db: PgPool,
}

impl ServiceAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建服务账号
    pub async fn create(
        &self,
        name: &str,
        api_key: Uuid,
        api_secret_hash: &str,
    ) -> Result<ServiceAccount, AppError> {
        let account = sqlx::query_as::<_, ServiceAccount>(
            r#"
            INSERT INTO service_accounts (id, name, api_key, api_secret_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(api_key)
        .bind(api_secret_hash)
        .fetch_one(&self.db)
        .await?;

        Ok(account)
    }

    /// 根据 API key 查找
    pub async fn find_by_api_key(&self, api_key: Uuid) -> Result<Option<ServiceAccount>, AppError> {
        let account = sqlx::query_as::<_, ServiceAccount>(
            "SELECT * FROM service_accounts WHERE api_key = $1",
        )
        .bind(api_key)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceAccount>, AppError> {
        let account =
            sqlx::query_as::<_, ServiceAccount>("SELECT * FROM service_accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        Ok(account)
    }

    pub async fn list(&self) -> Result<Vec<ServiceAccount>, AppError> {
        let accounts =
            sqlx::query_as::<_, ServiceAccount>("SELECT * FROM service_accounts ORDER BY name")
                .fetch_all(&self.db)
                .await?;

        Ok(accounts)
    }

    /// 启用/禁用
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<ServiceAccount>, AppError> {
        let account = sqlx::query_as::<_, ServiceAccount>(
            "UPDATE service_accounts SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// 删除服务账号（会话随之级联删除）
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM service_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
