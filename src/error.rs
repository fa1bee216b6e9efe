//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::password::CodecError;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 用户名/密码错误、API key/secret 错误、标识符格式错误，对外统一呈现
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session token invalid")]
    TokenInvalid,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Required configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Access denied")]
    AuthorizationDenied,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::TokenInvalid | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AuthorizationDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_)
            | AppError::ConfigurationMissing(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Authentication failed".to_string(),
            AppError::TokenInvalid => "Invalid session".to_string(),
            AppError::TokenExpired => "Session expired".to_string(),
            AppError::AuthorizationDenied => "Access denied".to_string(),
            AppError::NotFound(what) => format!("Resource not found: {}", what),
            AppError::BadRequest(msg) | AppError::Validation(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::StoreUnavailable(_) => "Database error occurred".to_string(),
            AppError::ConfigurationMissing(_) | AppError::Config(_) => {
                "Configuration error".to_string()
            }
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 是否属于服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    // 便捷方法
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    /// 仅服务端错误携带，客户端错误的响应体保持逐字节一致
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let request_id = err
            .is_server_error()
            .then(|| uuid::Uuid::new_v4().to_string());

        ErrorResponse {
            error: ErrorDetail {
                code: err.code(),
                message: err.user_message(),
                request_id,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = ErrorResponse::from(&self);

        // 记录错误日志
        if let Some(request_id) = &error_response.error.request_id {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %request_id,
                "Application error"
            );
        } else {
            tracing::debug!(code = self.code(), message = %self, "Request rejected");
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        match e {
            config::ConfigError::NotFound(key) => AppError::ConfigurationMissing(key),
            other => AppError::Config(other.to_string()),
        }
    }
}

/// 密码编解码错误：比对失败与存储格式错误对外都是凭据无效
impl From<CodecError> for AppError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Hashing(msg) => AppError::Internal(msg),
            _ => AppError::InvalidCredentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::InvalidCredentials.code(), 401);
        assert_eq!(AppError::TokenInvalid.code(), 401);
        assert_eq!(AppError::TokenExpired.code(), 401);
        assert_eq!(AppError::AuthorizationDenied.code(), 403);
        assert_eq!(AppError::not_found("user").code(), 404);
        assert_eq!(AppError::Conflict("last admin".to_string()).code(), 409);
        assert_eq!(AppError::ConfigurationMissing("x".to_string()).code(), 500);
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::StoreUnavailable(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Database error occurred");
        assert!(!message.contains("sqlx"));
    }

    #[test]
    fn test_expired_is_distinct_from_invalid() {
        assert_ne!(
            AppError::TokenExpired.user_message(),
            AppError::TokenInvalid.user_message()
        );
    }

    #[test]
    fn test_client_errors_render_identically() {
        let a = serde_json::to_string(&ErrorResponse::from(&AppError::InvalidCredentials)).unwrap();
        let b = serde_json::to_string(&ErrorResponse::from(&AppError::InvalidCredentials)).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains("request_id"));
    }

    #[test]
    fn test_server_errors_carry_request_id() {
        let body = ErrorResponse::from(&AppError::internal_error("boom"));
        assert!(body.error.request_id.is_some());
        assert_eq!(body.error.message, "Internal server error");
    }

    #[test]
    fn test_config_not_found_maps_to_missing() {
        let err: AppError = config::ConfigError::NotFound("security.signing_secret".into()).into();
        assert!(matches!(err, AppError::ConfigurationMissing(key) if key == "security.signing_secret"));
    }
}
