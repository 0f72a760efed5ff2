//! # 会话生命周期集成测试
//!
//! 同一组场景分别在内存存储和 SQLite 存储上运行

mod common;

use chrono::Duration;
use std::sync::Arc;

use api_rbac::app::AppContext;
use api_rbac::auth::{LoginRequest, ManualClock};
use api_rbac::error::{RbacError, TokenError, UnauthorizedReason};

fn login_request(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email_or_username: identifier.to_string(),
        password: password.to_string(),
    }
}

fn is_invalid_refresh(err: &RbacError) -> bool {
    matches!(
        err,
        RbacError::Unauthorized(UnauthorizedReason::InvalidOrExpiredRefreshToken)
    )
}

async fn register_then_login(ctx: &AppContext) {
    common::register(ctx, "alice@example.com", "alice").await;

    let by_email = ctx
        .sessions
        .login(login_request("alice@example.com", "secret-pass"))
        .await
        .unwrap();
    assert!(!by_email.tokens.access_token.is_empty());
    assert!(!by_email.tokens.refresh_token.is_empty());

    let by_username = ctx
        .sessions
        .login(login_request("alice", "secret-pass"))
        .await
        .unwrap();
    assert_eq!(by_username.user.id, by_email.user.id);

    let err = ctx
        .sessions
        .login(login_request("Alice", "secret-pass"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RbacError::Unauthorized(UnauthorizedReason::InvalidCredentials)
    ));
}

async fn logout_revokes_refresh_token(ctx: &AppContext) {
    let session = common::register(ctx, "bob@example.com", "bob").await;
    let refresh = session.tokens.refresh_token;

    ctx.sessions.refresh_access_token(&refresh).await.unwrap();
    ctx.sessions.logout(&refresh).await.unwrap();

    let err = ctx.sessions.refresh_access_token(&refresh).await.unwrap_err();
    assert!(is_invalid_refresh(&err));

    // 再次登出同一令牌不报错
    ctx.sessions.logout(&refresh).await.unwrap();
}

async fn change_password_revokes_sessions(ctx: &AppContext) {
    let session = common::register(ctx, "carol@example.com", "carol").await;
    let login = ctx
        .sessions
        .login(login_request("carol", "secret-pass"))
        .await
        .unwrap();

    ctx.sessions
        .change_password(session.user.id, "secret-pass", "new-secret")
        .await
        .unwrap();

    for refresh in [&session.tokens.refresh_token, &login.tokens.refresh_token] {
        let err = ctx.sessions.refresh_access_token(refresh).await.unwrap_err();
        assert!(is_invalid_refresh(&err));
    }

    ctx.sessions
        .login(login_request("carol", "new-secret"))
        .await
        .unwrap();
    assert!(ctx
        .sessions
        .login(login_request("carol", "secret-pass"))
        .await
        .is_err());
}

async fn refresh_is_not_rotated(ctx: &AppContext) {
    let session = common::register(ctx, "dave@example.com", "dave").await;
    let refresh = session.tokens.refresh_token.clone();

    let (first, second) = tokio::join!(
        ctx.sessions.refresh_access_token(&refresh),
        ctx.sessions.refresh_access_token(&refresh),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    let identity = ctx.sessions.authenticate(&first.access_token).unwrap();
    assert_eq!(identity.id, session.user.id);
    ctx.sessions.authenticate(&second.access_token).unwrap();
}

async fn expiry_follows_clock(ctx: &AppContext, clock: &Arc<ManualClock>) {
    let session = common::register(ctx, "erin@example.com", "erin").await;

    clock.advance(Duration::seconds(901));
    let err = ctx
        .sessions
        .authenticate(&session.tokens.access_token)
        .unwrap_err();
    assert!(matches!(
        err,
        RbacError::Unauthorized(UnauthorizedReason::AccessToken(TokenError::Expired))
    ));

    // 刷新令牌仍然有效，可换取新的访问令牌
    let renewed = ctx
        .sessions
        .refresh_access_token(&session.tokens.refresh_token)
        .await
        .unwrap();
    ctx.sessions.authenticate(&renewed.access_token).unwrap();

    clock.advance(Duration::days(8));
    let err = ctx
        .sessions
        .refresh_access_token(&session.tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(is_invalid_refresh(&err));

    assert_eq!(ctx.sessions.cleanup_expired_tokens().await.unwrap(), 1);
}

async fn access_token_is_not_a_refresh_token(ctx: &AppContext) {
    let session = common::register(ctx, "frank@example.com", "frank").await;
    let err = ctx
        .sessions
        .refresh_access_token(&session.tokens.access_token)
        .await
        .unwrap_err();
    assert!(is_invalid_refresh(&err));
    assert!(ctx
        .sessions
        .authenticate(&session.tokens.refresh_token)
        .is_err());
}

#[tokio::test]
async fn memory_register_then_login() {
    let (ctx, _) = common::memory_context();
    register_then_login(&ctx).await;
}

#[tokio::test]
async fn database_register_then_login() {
    let (ctx, _) = common::database_context().await;
    register_then_login(&ctx).await;
}

#[tokio::test]
async fn memory_logout_revokes_refresh_token() {
    let (ctx, _) = common::memory_context();
    logout_revokes_refresh_token(&ctx).await;
}

#[tokio::test]
async fn database_logout_revokes_refresh_token() {
    let (ctx, _) = common::database_context().await;
    logout_revokes_refresh_token(&ctx).await;
}

#[tokio::test]
async fn memory_change_password_revokes_sessions() {
    let (ctx, _) = common::memory_context();
    change_password_revokes_sessions(&ctx).await;
}

#[tokio::test]
async fn database_change_password_revokes_sessions() {
    let (ctx, _) = common::database_context().await;
    change_password_revokes_sessions(&ctx).await;
}

#[tokio::test]
async fn memory_refresh_is_not_rotated() {
    let (ctx, _) = common::memory_context();
    refresh_is_not_rotated(&ctx).await;
}

#[tokio::test]
async fn database_refresh_is_not_rotated() {
    let (ctx, _) = common::database_context().await;
    refresh_is_not_rotated(&ctx).await;
}

#[tokio::test]
async fn memory_expiry_follows_clock() {
    let (ctx, clock) = common::memory_context();
    expiry_follows_clock(&ctx, &clock).await;
}

#[tokio::test]
async fn database_expiry_follows_clock() {
    let (ctx, clock) = common::database_context().await;
    expiry_follows_clock(&ctx, &clock).await;
}

#[tokio::test]
async fn memory_access_token_is_not_a_refresh_token() {
    let (ctx, _) = common::memory_context();
    access_token_is_not_a_refresh_token(&ctx).await;
}
