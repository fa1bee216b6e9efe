//! 审计记录查询

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState,
    models::action::ActionFilters,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 分页查询审计记录（仅管理员）
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(filters): Query<ActionFilters>,
) -> Result<impl IntoResponse, AppError> {
    state.access_service.require_admin(&auth_context.principal).await?;

    let page = state.audit_service.list(&filters).await?;
    Ok(Json(page))
}
