//! # 认证中间件
//!
//! 从请求头中提取访问令牌，验证并将调用者身份注入到请求扩展中。

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::auth::types::BEARER;
use crate::error::{RbacError, Result, UnauthorizedReason};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::request_id::RequestId;
use crate::management::server::AppState;

/// 包含认证用户信息的上下文
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: AuthenticatedUser,
}

impl AuthContext {
    #[must_use]
    pub const fn user_id(&self) -> i32 {
        self.user.id
    }
}

/// 解析 `Authorization: Bearer <token>`
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

/// Axum认证中间件
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(RbacError::Unauthorized(UnauthorizedReason::MissingIdentity))?;

    let user = state.sessions.authenticate(token).inspect_err(|e| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        ldebug!(
            request_id,
            LogStage::Authentication,
            LogComponent::Api,
            "token_rejected",
            format!("访问令牌校验失败: {e}")
        );
    })?;

    request.extensions_mut().insert(Arc::new(AuthContext { user }));
    Ok(next.run(request).await)
}
