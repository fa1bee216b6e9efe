//! Session repository (会话数据访问)
//! Tokens are only ever stored and looked up by digest.

use crate::{
    error::AppError,
    models::session::{ServiceSessionToken, UserSessionToken},
};
use sqlx::PgPool;
use uuid::Uuid;

pub struct SessionRepository {
    db: PgPool,
}

impl SessionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ==================== User Sessions ====================

    pub async fn insert_user_session(&self, row: &UserSessionToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_session_tokens (id, token_hash, user_id, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.id)
        .bind(&row.token_hash)
        .bind(row.user_id)
        .bind(row.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn find_user_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<UserSessionToken>, AppError> {
        let row = sqlx::query_as::<_, UserSessionToken>(
            "SELECT * FROM user_session_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// 删除会话；重复删除不是错误
    pub async fn delete_user_session(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_session_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Service Sessions ====================

    pub async fn insert_service_session(&self, row: &ServiceSessionToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO service_session_tokens (
                id, token_hash, refresh_token_hash, service_account_id, expires_at, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.id)
        .bind(&row.token_hash)
        .bind(&row.refresh_token_hash)
        .bind(row.service_account_id)
        .bind(row.expires_at)
        .bind(row.issued_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn find_service_session(
        &self,
        token_hash: &str,
    ) -> Result<Option<ServiceSessionToken>, AppError> {
        let row = sqlx::query_as::<_, ServiceSessionToken>(
            "SELECT * FROM service_session_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    pub async fn delete_service_session(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM service_session_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Exchange a refresh token for a new session in one transaction.
    ///
    /// The old row is deleted first; a concurrent redemption of the same
    /// refresh token blocks on that row and then finds nothing. The old row is
    /// only taken when its account is active and it was issued at or after
    /// `min_issued_at`. `replacement` builds the new row for the owning
    /// account. Returns `None` when no redeemable row exists.
    pub async fn exchange_refresh_token<F>(
        &self,
        refresh_token_hash: &str,
        min_issued_at: i64,
        replacement: F,
    ) -> Result<Option<ServiceSessionToken>, AppError>
    where
        F: FnOnce(Uuid) -> Result<ServiceSessionToken, AppError>,
    {
        let mut tx = self.db.begin().await?;

        let old = sqlx::query_as::<_, ServiceSessionToken>(
            r#"
            DELETE FROM service_session_tokens s
            USING service_accounts a
            WHERE s.refresh_token_hash = $1
                AND a.id = s.service_account_id
                AND a.active
                AND s.issued_at >= $2
            RETURNING s.*
            "#,
        )
        .bind(refresh_token_hash)
        .bind(min_issued_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(old) = old else {
            tx.rollback().await?;
            return Ok(None);
        };

        let new_row = replacement(old.service_account_id)?;

        sqlx::query(
            r#"
            INSERT INTO service_session_tokens (
                id, token_hash, refresh_token_hash, service_account_id, expires_at, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(new_row.id)
        .bind(&new_row.token_hash)
        .bind(&new_row.refresh_token_hash)
        .bind(new_row.service_account_id)
        .bind(new_row.expires_at)
        .bind(new_row.issued_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(new_row))
    }

    // ==================== Maintenance ====================

    /// 清理过期会话，返回删除行数
    /// 服务会话在刷新窗口结束前仍可兑换，按签发时间清理
    pub async fn sweep_expired(&self, now: i64, min_issued_at: i64) -> Result<u64, AppError> {
        let users = sqlx::query("DELETE FROM user_session_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await?;

        let services = sqlx::query(
            "DELETE FROM service_session_tokens WHERE expires_at <= $1 AND issued_at < $2",
        )
        .bind(now)
        .bind(min_issued_at)
        .execute(&self.db)
        .await?;

        Ok(users.rows_affected() + services.rows_affected())
    }
}
