//! 登录/登出/刷新完整流程测试（需要数据库）
//!
//! 运行方式：TEST_DATABASE_URL=... cargo test -- --ignored

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use credential_authority::{
    auth::{PasswordCodec, TokenKind},
    config::AppConfig,
    error::AppError,
    services::auth_service::{
        MSG_MALFORMED_API, MSG_SERVICE_DISABLED, MSG_UNREADABLE_HASH, MSG_USER_UNKNOWN,
        MSG_WRONG_PASSWORD, MSG_WRONG_SECRET,
    },
};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

fn login_request(username: &str, password: &str) -> Request<Body> {
    let mut request = json_request(
        "POST",
        "/api/v1/auth/login",
        json!({"username": username, "password": password}),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
    request
}

fn me_with_cookie(cookie: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn me_with_bearer(token: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn setup() -> (AppConfig, sqlx::PgPool, axum::Router) {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config.clone(), pool.clone());
    (config, pool, create_test_router(state))
}

// ==================== 用户会话 ====================

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_login_sets_cookie_and_logout_revokes() {
    let (config, pool, app) = setup().await;
    create_test_user(&pool, &config, "alice", "Alice-Password-1", "USER", None).await;

    // 用户名大小写与空白不敏感
    let response = send(&app, login_request("  Alice ", "Alice-Password-1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=3600"));
    let cookie = session_cookie(&response).unwrap();

    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());

    let me = send(&app, me_with_cookie(&cookie)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = body_json(me).await;
    assert_eq!(me["kind"], "user");
    assert_eq!(me["username"], "alice");

    let logout = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::OK);

    // 签名仍然有效，但会话行已删除
    let me = send(&app, me_with_cookie(&cookie)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(action_messages(&pool, "SIGN_IN").await, vec!["user signed in"]);
    assert_eq!(action_messages(&pool, "SIGN_OUT").await, vec!["user signed out"]);

    let ip: String = sqlx::query_scalar("SELECT ip_address FROM actions WHERE type = 'SIGN_IN'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(ip, "203.0.113.9");
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_unknown_user_and_wrong_password_are_indistinguishable() {
    let (config, pool, app) = setup().await;
    create_test_user(&pool, &config, "admin", "Admin-Password-1", "ADMIN", None).await;

    let ghost = send(&app, login_request("ghost", "whatever-password")).await;
    assert_eq!(ghost.status(), StatusCode::UNAUTHORIZED);
    let ghost_cookie = ghost.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(ghost_cookie.contains("Max-Age=0"));
    let ghost_body = body_bytes(ghost).await;

    let wrong = send(&app, login_request("admin", "not-the-password")).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong_body = body_bytes(wrong).await;

    assert_eq!(ghost_body, wrong_body);

    let messages = action_messages(&pool, "FAILED_SIGN_IN").await;
    assert_eq!(messages, vec![MSG_USER_UNKNOWN, MSG_WRONG_PASSWORD]);

    // 未知用户的失败记录没有归属
    let owners: Vec<Option<Uuid>> =
        sqlx::query_scalar("SELECT user_id FROM actions WHERE type = 'FAILED_SIGN_IN' ORDER BY performed_at")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert!(owners[0].is_none());
    assert!(owners[1].is_some());
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_unreadable_hash_is_rejected_and_audited() {
    let (_config, pool, app) = setup().await;
    insert_user_with_hash(&pool, "broken", "$argon2id$v=19$m=1024", "USER", None).await;

    let response = send(&app, login_request("broken", "anything-at-all")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        action_messages(&pool, "FAILED_SIGN_IN").await,
        vec![MSG_UNREADABLE_HASH]
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_legacy_hash_upgraded_on_login() {
    let (config, pool, app) = setup().await;

    let mut legacy_security = config.security.clone();
    legacy_security.password_hash_algorithm = "bcrypt".to_string();
    let legacy_hash = PasswordCodec::from_config(&legacy_security)
        .unwrap()
        .hash("Legacy-Password-1")
        .unwrap();
    let user_id = insert_user_with_hash(&pool, "veteran", &legacy_hash, "USER", None).await;

    let response = send(&app, login_request("veteran", "Legacy-Password-1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(stored.starts_with("$argon2id$v=19$"));

    // 升级后的哈希依然可用
    let response = send(&app, login_request("veteran", "Legacy-Password-1")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_deleted_user_session_is_invalid() {
    let (config, pool, app) = setup().await;
    let user_id = create_test_user(&pool, &config, "temp", "Temp-Password-1", "USER", None).await;

    let response = send(&app, login_request("temp", "Temp-Password-1")).await;
    let cookie = session_cookie(&response).unwrap();

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let me = send(&app, me_with_cookie(&cookie)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

// ==================== 服务账号会话 ====================

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_service_login_logout_cycle() {
    let (_config, pool, app) = setup().await;
    let (account_id, credentials) = create_test_service_account(&pool, "ci-runner", true).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/v1/service/login",
            json!({
                "api_key": credentials.api_key.to_string(),
                "api_secret": credentials.api_secret.to_string(),
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["session_token"].as_str().unwrap().to_string();
    assert!(Uuid::parse_str(body["refresh_token"].as_str().unwrap()).is_ok());

    let me = send(&app, me_with_bearer(&token)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = body_json(me).await;
    assert_eq!(me["kind"], "service");
    assert_eq!(me["id"], account_id.to_string());

    let logout = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/service/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let me = send(&app, me_with_bearer(&token)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM service_session_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_service_login_failures_are_audited() {
    let (_config, pool, app) = setup().await;
    let (_, active) = create_test_service_account(&pool, "active", true).await;
    let (_, disabled) = create_test_service_account(&pool, "disabled", false).await;

    let attempts = [
        json!({"api_key": "nope", "api_secret": "nope"}),
        json!({"api_key": active.api_key.to_string(), "api_secret": Uuid::new_v4().to_string()}),
        json!({"api_key": disabled.api_key.to_string(), "api_secret": disabled.api_secret.to_string()}),
    ];

    let mut bodies = Vec::new();
    for attempt in attempts {
        let response = send(&app, json_request("POST", "/api/v1/service/login", attempt)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(body_bytes(response).await);
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));

    assert_eq!(
        action_messages(&pool, "FAILED_SIGN_IN").await,
        vec![MSG_MALFORMED_API, MSG_WRONG_SECRET, MSG_SERVICE_DISABLED]
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_refresh_token_is_single_use() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());
    let (account_id, _) = create_test_service_account(&pool, "worker", true).await;

    let first = state.session_service.issue_service(account_id).await.unwrap();
    let refresh = first.refresh_token.to_string();

    let second = state
        .auth_service
        .refresh_service(&refresh, "10.0.0.1")
        .await
        .unwrap();
    assert_ne!(second.session_token, first.session_token);
    assert_ne!(second.refresh_token, first.refresh_token);

    // 旧会话随刷新令牌一起被替换
    assert!(matches!(
        state
            .session_service
            .resolve(&first.session_token, TokenKind::Service)
            .await,
        Err(AppError::TokenInvalid)
    ));
    state
        .session_service
        .resolve(&second.session_token, TokenKind::Service)
        .await
        .unwrap();

    assert!(matches!(
        state.auth_service.refresh_service(&refresh, "10.0.0.1").await,
        Err(AppError::InvalidCredentials)
    ));
    assert_eq!(
        action_messages(&pool, "TOKEN_REFRESH").await,
        vec!["service session refreshed", "refresh token rejected"]
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_refresh_has_one_winner() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());
    let (account_id, _) = create_test_service_account(&pool, "racer", true).await;

    let issued = state.session_service.issue_service(account_id).await.unwrap();
    let refresh = issued.refresh_token.to_string();

    let (a, b) = tokio::join!(
        state.auth_service.refresh_service(&refresh, "10.0.0.1"),
        state.auth_service.refresh_service(&refresh, "10.0.0.2"),
    );

    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one refresh must succeed"
    );

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM service_session_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_disabled_account_cannot_use_or_refresh_sessions() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());
    let (account_id, _) = create_test_service_account(&pool, "retired", true).await;

    let issued = state.session_service.issue_service(account_id).await.unwrap();
    state
        .service_account_service
        .set_active(account_id, false)
        .await
        .unwrap();

    assert!(matches!(
        state
            .session_service
            .resolve(&issued.session_token, TokenKind::Service)
            .await,
        Err(AppError::TokenInvalid)
    ));
    assert!(matches!(
        state
            .auth_service
            .refresh_service(&issued.refresh_token.to_string(), "10.0.0.1")
            .await,
        Err(AppError::InvalidCredentials)
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_sweep_keeps_redeemable_service_sessions() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config.clone(), pool.clone());
    let user_id = create_test_user(&pool, &config, "sleepy", "Sleepy-Password-1", "USER", None).await;
    let (account_id, _) = create_test_service_account(&pool, "nightly", true).await;

    state.session_service.issue_user(user_id).await.unwrap();
    let issued = state.session_service.issue_service(account_id).await.unwrap();

    // 会话已过期，但刷新令牌仍在窗口内
    sqlx::query("UPDATE user_session_tokens SET expires_at = 0")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE service_session_tokens SET expires_at = 0")
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(state.session_service.sweep_expired().await.unwrap(), 1);

    state
        .auth_service
        .refresh_service(&issued.refresh_token.to_string(), "10.0.0.1")
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires PostgreSQL"]
async fn test_ready_once_schema_is_migrated() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_router(create_test_app_state(config, pool));

    let response = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ready"], true);
    assert_eq!(body["checks"][0]["status"], "healthy");
}
