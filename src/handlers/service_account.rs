//! 服务账号管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::extract::ClientIp,
    middleware::AppState,
    models::service_account::{
        CreateServiceAccountRequest, ServiceAccountResponse, SetActiveRequest,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

pub async fn list_service_accounts(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let accounts: Vec<ServiceAccountResponse> = state
        .service_account_service
        .list()
        .await?
        .into_iter()
        .map(ServiceAccountResponse::from)
        .collect();

    Ok(Json(accounts))
}

/// 创建服务账号，响应中包含仅此一次可见的 secret
pub async fn create_service_account(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Json(req): Json<CreateServiceAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let created = state
        .service_account_service
        .create(req, &auth_context.principal, &client_ip)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn set_service_account_active(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let account = state
        .service_account_service
        .set_active(id, req.active)
        .await?;

    Ok(Json(ServiceAccountResponse::from(account)))
}

pub async fn delete_service_account(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    state
        .service_account_service
        .delete(id, &auth_context.principal, &client_ip)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
