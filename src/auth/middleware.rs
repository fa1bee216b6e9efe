//! 会话认证中间件
//! 用户会话通过 Cookie 传递，服务账号会话通过 Bearer 头传递

use crate::{
    auth::token::TokenKind, error::AppError, middleware::AppState,
    models::principal::Principal,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub token: String,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::TokenInvalid)
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 定位请求携带的会话令牌：Bearer 优先（服务账号），其次 Cookie（用户）
pub fn locate_session_token(state: &AppState, headers: &HeaderMap) -> Option<(String, TokenKind)> {
    if let Some(token) = extract_token(headers) {
        return Some((token, TokenKind::Service));
    }

    let jar = CookieJar::from_headers(headers);
    state
        .cookies
        .read(&jar)
        .map(|token| (token, TokenKind::User))
}

/// 会话认证中间件 - 必须认证
pub async fn session_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (token, kind) =
        locate_session_token(&state, req.headers()).ok_or(AppError::TokenInvalid)?;

    let principal = state.session_service.resolve(&token, kind).await?;

    tracing::debug!(principal_id = %principal.id(), kind = ?kind, "Session authenticated");

    req.extensions_mut().insert(AuthContext { principal, token });

    Ok(next.run(req).await)
}
