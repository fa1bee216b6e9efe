//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::extract::ClientIp,
    middleware::AppState,
    models::user::{ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, UserResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出用户
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let users: Vec<UserResponse> = state
        .user_service
        .list()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(json!({
        "users": users,
        "count": users.len()
    })))
}

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let user = state
        .user_service
        .create(req, &auth_context.principal, &client_ip)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let user = state.user_service.get(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// 更新用户
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let user = state
        .user_service
        .update(id, req, &auth_context.principal, &client_ip)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    state
        .user_service
        .delete(id, &auth_context.principal, &client_ip)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// 修改自己的密码
pub async fn change_own_password(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth_context
        .principal
        .as_user()
        .ok_or(AppError::AuthorizationDenied)?;

    state
        .user_service
        .change_password(user.id, req, &client_ip)
        .await?;

    Ok(Json(json!({"message": "Password changed"})))
}
