//! User repository (数据库访问层)

use crate::{
    error::AppError,
    models::user::{Provider, Role, UpdateUserRequest, User},
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// New user row
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub provider: Provider,
    pub team_id: Option<Uuid>,
}

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 根据用户名查找本地用户（用户名须已小写）
    pub async fn find_local_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND provider = 'LOCAL'",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 列出所有用户
    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    /// 列出团队成员
    pub async fn list_by_team(&self, team_id: Uuid) -> Result<Vec<User>, AppError> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE team_id = $1 ORDER BY username")
                .bind(team_id)
                .fetch_all(&self.db)
                .await?;

        Ok(users)
    }

    /// 管理员数量
    pub async fn count_admins(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// 创建用户，用户名冲突返回 Conflict
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, first_name, last_name, role, provider, team_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.role.as_str())
        .bind(new.provider.as_str())
        .bind(new.team_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", new.username))
            } else {
                e.into()
            }
        })
    }

    /// 更新资料、角色与可选的新密码哈希，同一事务内完成；降级最后一个管理员会被拒绝
    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateUserRequest,
        password_hash: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let mut tx = self.db.begin().await?;

        if req.role == Some(Role::User) {
            ensure_not_last_admin(&mut tx, id).await?;
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                role = COALESCE($4, role),
                team_id = COALESCE($5, team_id),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.role.map(|r| r.as_str()))
        .bind(req.team_id)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// 更新密码哈希
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除用户；删除最后一个管理员会被拒绝
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await?;

        ensure_not_last_admin(&mut tx, id).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Locks every admin row so concurrent removals serialize, then refuses to
/// take away the only remaining one.
async fn ensure_not_last_admin(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<(), AppError> {
    let admins: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'ADMIN' FOR UPDATE")
            .fetch_all(&mut **tx)
            .await?;

    if admins.len() <= 1 && admins.contains(&id) {
        return Err(AppError::Conflict(
            "Cannot remove the last administrator".to_string(),
        ));
    }

    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
