//! 审计服务
//! 写入失败只记录日志与指标，不影响被审计的操作

use crate::{
    error::AppError,
    models::action::{ActionFilters, ActionOwner, ActionPage, ActionType},
    repository::action_repo::ActionRepository,
};
use sqlx::PgPool;
use tracing::{debug, warn};

pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 记录审计事件（尽力而为）
    pub async fn record(
        &self,
        ip: &str,
        action_type: ActionType,
        message: &str,
        owner: Option<ActionOwner>,
    ) {
        let repo = ActionRepository::new(self.db.clone());

        match repo.insert(ip, action_type, message, owner).await {
            Ok(()) => {
                debug!(
                    action = action_type.as_str(),
                    ip = %ip,
                    message = %message,
                    "Audit action recorded"
                );
            }
            Err(e) => {
                metrics::counter!("audit_write_failures_total", "type" => action_type.as_str())
                    .increment(1);
                warn!(
                    action = action_type.as_str(),
                    ip = %ip,
                    message = %message,
                    error = %e,
                    "Failed to record audit action"
                );
            }
        }
    }

    /// 分页查询审计记录
    pub async fn list(&self, filters: &ActionFilters) -> Result<ActionPage, AppError> {
        let repo = ActionRepository::new(self.db.clone());

        let items = repo.list(filters).await?;
        let total = repo.count(filters).await?;
        let (per_page, offset) = filters.limit_offset();

        Ok(ActionPage {
            items,
            total,
            page: offset / per_page + 1,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_record_swallows_store_failure() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgresql://nobody@127.0.0.1:1/nothing")
            .unwrap();
        let service = AuditService::new(pool);

        // Returns unit even though the store is unreachable
        service
            .record(
                "127.0.0.1",
                ActionType::FailedSignIn,
                "user does not exist",
                Some(ActionOwner::User(Uuid::new_v4())),
            )
            .await;
    }
}
