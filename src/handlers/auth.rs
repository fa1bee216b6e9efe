//! 认证相关的 HTTP 处理器

use crate::{
    auth::{extract_token, middleware::AuthContext, TokenKind},
    error::AppError,
    handlers::extract::{ClientIp, JsonOrForm},
    middleware::AppState,
    models::{
        auth::{LoginRequest, LoginResponse, RefreshRequest, ServiceLoginRequest, ServiceTokenResponse},
        principal::PrincipalResponse,
    },
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;

/// 用户登录：成功写入会话 Cookie，失败清除 Cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    jar: CookieJar,
    body: Result<JsonOrForm<LoginRequest>, AppError>,
) -> Response {
    let JsonOrForm(req) = match body {
        Ok(body) => body,
        Err(e) => return (state.cookies.clear(jar), e).into_response(),
    };

    match state.auth_service.login_user(req, &client_ip).await {
        Ok((user, signed)) => {
            let expires_at = signed.expires_at;
            let jar = state.cookies.set(jar, signed.token);
            let body = LoginResponse {
                user: user.into(),
                expires_at,
            };
            (jar, Json(body)).into_response()
        }
        Err(e) => (state.cookies.clear(jar), e).into_response(),
    }
}

/// 用户登出：无论结果如何都清除 Cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    jar: CookieJar,
) -> Response {
    let Some(token) = state.cookies.read(&jar) else {
        return (
            state.cookies.clear(jar),
            Json(json!({"message": "Logged out"})),
        )
            .into_response();
    };

    let result = state
        .auth_service
        .logout(&token, TokenKind::User, &client_ip)
        .await;
    let jar = state.cookies.clear(jar);

    match result {
        Ok(()) => (jar, Json(json!({"message": "Logged out"}))).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

/// 获取当前主体信息
pub async fn get_current_principal(auth_context: AuthContext) -> Json<PrincipalResponse> {
    Json(auth_context.principal.into())
}

/// 服务账号登录
pub async fn service_login(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonOrForm(req): JsonOrForm<ServiceLoginRequest>,
) -> Result<Json<ServiceTokenResponse>, AppError> {
    let issued = state.auth_service.login_service(req, &client_ip).await?;
    Ok(Json(issued.into()))
}

/// 兑换刷新令牌
pub async fn service_refresh(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonOrForm(req): JsonOrForm<RefreshRequest>,
) -> Result<Json<ServiceTokenResponse>, AppError> {
    let issued = state
        .auth_service
        .refresh_service(&req.refresh_token, &client_ip)
        .await?;
    Ok(Json(issued.into()))
}

/// 服务账号登出（Bearer 会话令牌，允许已过期）
pub async fn service_logout(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_token(&headers).ok_or(AppError::TokenInvalid)?;

    state
        .auth_service
        .logout(&token, TokenKind::Service, &client_ip)
        .await?;

    Ok(Json(json!({"message": "Logged out"})))
}
