//! 凭据存储的连接池、迁移与就绪检查

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 就绪检查依赖的核心表
const REQUIRED_TABLES: &[&str] = &[
    "teams",
    "users",
    "service_accounts",
    "user_session_tokens",
    "service_session_tokens",
    "actions",
];

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Credential store connection failed");
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        "Credential store pool ready"
    );
    Ok(pool)
}

/// 应用内嵌迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");

    migrator.run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Credential store migration failed");
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!(migrations = migrator.iter().count(), "Credential store schema up to date");
    Ok(())
}

/// 检查存储可达且已完成迁移
pub async fn check_store(pool: &PgPool) -> StoreStatus {
    metrics::gauge!("db_pool_size").set(pool.size() as f64);
    metrics::gauge!("db_pool_idle").set(pool.num_idle() as f64);

    let present: Result<i64, sqlx::Error> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM unnest($1::text[]) AS t(name) WHERE to_regclass(t.name) IS NOT NULL",
    )
    .bind(REQUIRED_TABLES)
    .fetch_one(pool)
    .await;

    match present {
        Ok(n) if n as usize == REQUIRED_TABLES.len() => StoreStatus::Ready,
        Ok(n) => {
            tracing::warn!(present = n, "Credential store schema incomplete");
            StoreStatus::Unmigrated
        }
        Err(e) => {
            tracing::warn!(error = %e, "Credential store unreachable");
            StoreStatus::Unreachable
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Ready,
    Unmigrated,
    Unreachable,
}

impl StoreStatus {
    /// 对外的就绪说明，不含连接细节
    pub fn message(self) -> Option<&'static str> {
        match self {
            StoreStatus::Ready => None,
            StoreStatus::Unmigrated => Some("database schema missing"),
            StoreStatus::Unreachable => Some("database unreachable"),
        }
    }
}
