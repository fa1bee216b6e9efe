//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, middleware::AppState};

/// 请求体大小上限
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需会话；登出自行校验令牌，过期令牌也可登出）
    let auth_routes = Router::new()
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/service/login", post(handlers::auth::service_login))
        .route("/api/v1/service/refresh", post(handlers::auth::service_refresh))
        .route("/api/v1/service/logout", post(handlers::auth::service_logout));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::get_current_principal))
        // 用户管理（管理员）
        .route(
            "/api/v1/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route(
            "/api/v1/users/me/password",
            put(handlers::user::change_own_password),
        )
        // 服务账号（管理员）
        .route(
            "/api/v1/service-accounts",
            get(handlers::service_account::list_service_accounts)
                .post(handlers::service_account::create_service_account),
        )
        .route(
            "/api/v1/service-accounts/{id}/active",
            put(handlers::service_account::set_service_account_active),
        )
        .route(
            "/api/v1/service-accounts/{id}",
            delete(handlers::service_account::delete_service_account),
        )
        // 审计记录（管理员）
        .route("/api/v1/actions", get(handlers::audit::list_actions))
        // 团队成员（按团队归属授权）
        .route(
            "/api/v1/teams/{id}/members",
            get(handlers::team::list_team_members),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::session_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}

/// 只允许本服务自身的源携带 Cookie 跨域访问
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let scheme = if config.cookie.https_enabled {
        "https"
    } else {
        "http"
    };

    match HeaderValue::from_str(&format!("{}://{}", scheme, config.server.hostname)) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        Err(_) => {
            tracing::warn!(hostname = %config.server.hostname, "Hostname is not a valid origin, CORS disabled");
            CorsLayer::new()
        }
    }
}
