//! HTTP 中间件
//! 应用状态、请求追踪、客户端 IP 解析

use crate::{
    auth::{cookie::SessionCookies, password::PasswordCodec, token::TokenSigner},
    config::AppConfig,
    error::AppError,
    services::{
        AccessService, AuditService, AuthService, ServiceAccountService, SessionService,
        UserService,
    },
};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 配置与各服务在启动时构建一次，之后只读共享
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: PgPool,
    pub cookies: SessionCookies,
    pub signer: Arc<TokenSigner>,
    pub codec: Arc<PasswordCodec>,
    pub audit_service: Arc<AuditService>,
    pub access_service: Arc<AccessService>,
    pub session_service: Arc<SessionService>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub service_account_service: Arc<ServiceAccountService>,
}

impl AppState {
    /// 由配置与连接池构建全部服务
    pub fn new(config: AppConfig, db: PgPool) -> Result<Self, AppError> {
        let signer = Arc::new(TokenSigner::from_config(&config)?);
        let codec = Arc::new(PasswordCodec::from_config(&config.security)?);

        let audit_service = Arc::new(AuditService::new(db.clone()));
        let access_service = Arc::new(AccessService::new(db.clone()));
        let session_service = Arc::new(SessionService::new(
            db.clone(),
            signer.clone(),
            &config.session,
        ));
        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            codec.clone(),
            session_service.clone(),
            audit_service.clone(),
        )?);
        let user_service = Arc::new(UserService::new(
            db.clone(),
            codec.clone(),
            config.security.clone(),
            access_service.clone(),
            audit_service.clone(),
        ));
        let service_account_service = Arc::new(ServiceAccountService::new(
            db.clone(),
            audit_service.clone(),
        ));

        Ok(Self {
            cookies: SessionCookies::from_config(&config),
            config,
            db,
            signer,
            codec,
            audit_service,
            access_service,
            session_service,
            auth_service,
            user_service,
            service_account_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签使用有限取值
        let method_label = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "OTHER",
        };
        let status_label = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_label, "status" => status_label)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 获取客户端 IP 地址
///
/// 仅在信任代理时读取 X-Forwarded-For / X-Real-IP，否则使用对端地址
pub fn get_client_ip(headers: &HeaderMap, trust_proxy: bool, peer: Option<SocketAddr>) -> String {
    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_client_ip_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();

        assert_eq!(get_client_ip(&headers, true, Some(peer)), "203.0.113.7");
        // Without proxy trust the header is ignored
        assert_eq!(get_client_ip(&headers, false, Some(peer)), "10.0.0.1");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(get_client_ip(&headers, true, None), "198.51.100.2");

        assert_eq!(get_client_ip(&HeaderMap::new(), true, None), "unknown");
    }
}
