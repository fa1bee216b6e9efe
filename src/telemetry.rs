//! 日志与追踪系统
//! 初始化结构化日志和指标描述

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统
pub fn init_telemetry(config: &AppConfig) {
    // RUST_LOG 优先于配置中的级别
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );
}

/// 注册指标描述
/// 导出器由部署环境安装；未安装时记录为空操作
pub fn init_metrics() {
    metrics::describe_counter!("http_requests_total", "HTTP requests by method and status class");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("auth_logins_total", "Login attempts by principal kind and result");
    metrics::describe_counter!(
        "audit_write_failures_total",
        "Audit records that could not be persisted"
    );
    metrics::describe_counter!("sessions_swept_total", "Expired session rows removed");
    metrics::describe_gauge!("db_pool_size", "Database pool connections");
    metrics::describe_gauge!("db_pool_idle", "Idle database pool connections");

    tracing::debug!("Metrics initialized");
}
