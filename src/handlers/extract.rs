//! 请求提取器

use crate::{error::AppError, middleware::{get_client_ip, AppState}};
use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Form, Json,
};
use serde::de::DeserializeOwned;
use std::{net::SocketAddr, sync::Arc};

/// Accepts `application/json` or `application/x-www-form-urlencoded` bodies
#[derive(Debug)]
pub struct JsonOrForm<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for JsonOrForm<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// Client address for audit records, honoring `server.trust_proxy`
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self(get_client_ip(
            &parts.headers,
            state.config.server.trust_proxy,
            peer,
        )))
    }
}
