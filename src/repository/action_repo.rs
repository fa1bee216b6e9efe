//! Action repository (审计数据访问)

use crate::{
    error::AppError,
    models::action::{Action, ActionFilters, ActionOwner, ActionType},
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub struct ActionRepository {
    db: PgPool,
}

impl ActionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 追加审计记录
    pub async fn insert(
        &self,
        ip_address: &str,
        action_type: ActionType,
        message: &str,
        owner: Option<ActionOwner>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO actions (id, ip_address, type, message, user_id, service_account_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ip_address)
        .bind(action_type.as_str())
        .bind(message)
        .bind(owner.and_then(|o| o.user_id()))
        .bind(owner.and_then(|o| o.service_account_id()))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 查询审计记录（按时间倒序）
    pub async fn list(&self, filters: &ActionFilters) -> Result<Vec<Action>, AppError> {
        let (limit, offset) = filters.limit_offset();

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM actions WHERE 1=1");
        push_filters(&mut query, filters);
        query
            .push(" ORDER BY performed_at DESC, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let actions = query.build_query_as::<Action>().fetch_all(&self.db).await?;
        Ok(actions)
    }

    /// 统计审计记录数量
    pub async fn count(&self, filters: &ActionFilters) -> Result<i64, AppError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM actions WHERE 1=1");
        push_filters(&mut query, filters);

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &ActionFilters) {
    if let Some(action_type) = filters.action_type {
        query.push(" AND type = ").push_bind(action_type.as_str());
    }
    if let Some(user_id) = filters.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(service_account_id) = filters.service_account_id {
        query
            .push(" AND service_account_id = ")
            .push_bind(service_account_id);
    }
}
