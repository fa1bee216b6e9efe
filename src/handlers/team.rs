//! 团队成员查询，受访问授权保护

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState,
    models::user::UserResponse,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list_team_members(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (team, members) = state
        .user_service
        .team_members(team_id, &auth_context.principal)
        .await?;

    let members: Vec<UserResponse> = members.into_iter().map(UserResponse::from).collect();

    Ok(Json(json!({
        "team": team,
        "members": members
    })))
}
