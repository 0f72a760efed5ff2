//! # HTTP 接口集成测试
//!
//! 通过 `tower::ServiceExt::oneshot` 直接驱动路由，不占用端口

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use api_rbac::app::AppContext;
use api_rbac::management::{AppState, create_router};

fn router(ctx: AppContext) -> Router {
    let config = ctx.config.server.clone();
    create_router(AppState::new(Arc::new(ctx)), &config)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn register_returns_201_with_tokens() {
    let (ctx, _) = common::memory_context();
    let app = router(ctx);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"email": "h@example.com", "username": "h", "password": "pw-123456"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["tokens"]["accessToken"].is_string());
    assert!(body["data"]["tokens"]["refreshToken"].is_string());
    assert_eq!(body["data"]["tokens"]["tokenType"], json!("Bearer"));
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["timestamp"].is_string());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({"email": "h@example.com", "username": "h2", "password": "pw-123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("RESOURCE_CONFLICT"));
}

#[tokio::test]
async fn protected_routes_require_bearer() {
    let (ctx, _) = common::memory_context();
    let app = router(ctx);

    let (status, body) = send(&app, get("/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("UNAUTHORIZED"));

    let (status, _) = send(&app, get("/api/roles", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let (ctx, _) = common::memory_context();
    let session = common::register(&ctx, "plain@example.com", "plain").await;
    let token = session.tokens.access_token;
    let app = router(ctx);

    let (status, body) = send(&app, get("/api/roles", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!("FORBIDDEN"));

    // 自身资料只需要认证
    let (status, body) = send(&app, get("/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("plain"));
}

#[tokio::test]
async fn granted_permission_opens_role_management() {
    let (ctx, _) = common::memory_context();
    let session = common::register(&ctx, "admin@example.com", "admin").await;
    common::grant(
        &ctx,
        session.user.id,
        "admin",
        &["roles:list", "roles:create"],
    )
    .await;
    let token = session.tokens.access_token;
    let app = router(ctx);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/roles",
            Some(&token),
            &json!({"code": "editor", "name": "Editor"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["code"], json!("editor"));

    let (status, body) = send(&app, get("/api/roles?page=1&limit=1", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(2));
    assert_eq!(body["data"]["items"][0]["code"], json!("editor"));
    assert_eq!(body["data"]["pagination"]["totalPages"], json!(2));

    // 未授予 roles:delete
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/api/roles/1")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_and_logout_over_http() {
    let (ctx, _) = common::memory_context();
    let session = common::register(&ctx, "r@example.com", "r").await;
    let refresh = session.tokens.refresh_token;
    let app = router(ctx);

    let body = json!({"refreshToken": refresh});
    let (status, reply) = send(&app, json_request("POST", "/api/auth/refresh", None, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply["data"]["accessToken"].is_string());

    let (status, _) = send(&app, json_request("POST", "/api/auth/logout", None, &body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, json_request("POST", "/api/auth/refresh", None, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_memory_store() {
    let (ctx, _) = common::memory_context();
    let app = router(ctx);

    let (status, body) = send(&app, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ok"));
    assert_eq!(body["data"]["database"], json!("memory"));
}

#[tokio::test]
async fn user_management_routes_are_gated_and_paged() {
    let (ctx, _) = common::memory_context();
    let admin = common::register(&ctx, "admin@example.com", "admin").await;
    let plain = common::register(&ctx, "plain@example.com", "plain").await;
    common::grant(
        &ctx,
        admin.user.id,
        "user-admin",
        &["users:list", "users:read", "users:create", "users:update"],
    )
    .await;
    let token = admin.tokens.access_token;
    let app = router(ctx);

    let (status, _) = send(&app, get("/api/users", Some(&plain.tokens.access_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/users",
            Some(&token),
            &json!({"email": "new@corp.io", "username": "newbie", "password": "pw-123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("tokens").is_none());
    let new_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, get("/api/users?email=corp&page=1&limit=5", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["items"][0]["username"], json!("newbie"));
    assert_eq!(body["data"]["pagination"]["limit"], json!(5));

    let (status, body) = send(&app, get("/api/users?limit=2", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(3));
    assert_eq!(body["data"]["pagination"]["totalPages"], json!(2));

    let (status, body) = send(&app, get(&format!("/api/users/{new_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("new@corp.io"));

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/users/{new_id}"),
            Some(&token),
            &json!({"username": "plain"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("RESOURCE_CONFLICT"));

    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/users/{new_id}"), Some(&token), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/users/{new_id}"),
            Some(&token),
            &json!({"name": "Newbie", "password": "pw-654321"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Newbie"));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({"emailOrUsername": "newbie", "password": "pw-654321"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["tokens"]["accessToken"].is_string());

    let (status, _) = send(&app, get("/api/users/9999", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
