//! # 认证处理器
//!
//! 注册、登录、刷新、登出与个人资料接口

use axum::extract::{Extension, Json, State};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{LoginRequest, ProfileUpdate, RegisterRequest};
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::management::middleware::{AuthContext, RequestId};
use crate::management::response;
use crate::management::server::AppState;

/// 刷新/登出请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// 修改密码请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// 注册
pub async fn register(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    let session = state.sessions.register(request).await?;
    linfo!(
        request_id,
        LogStage::Authentication,
        LogComponent::Api,
        "register",
        "用户注册成功",
        user_id = session.user.id
    );
    Ok(response::created(session))
}

/// 登录
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let session = state.sessions.login(request).await?;
    Ok(response::success_with_message(session, "登录成功"))
}

/// 用刷新令牌换取新的访问令牌
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Response> {
    let token = state
        .sessions
        .refresh_access_token(&request.refresh_token)
        .await?;
    Ok(response::success_with_message(token, "令牌刷新成功"))
}

/// 登出当前设备
pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Response> {
    state.sessions.logout(&request.refresh_token).await?;
    Ok(response::success_without_data("登出成功"))
}

/// 登出全部设备
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    state.sessions.logout_all(auth.user_id()).await?;
    Ok(response::success_without_data("已从所有设备登出"))
}

/// 当前用户信息
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    let user = state.sessions.current_user(auth.user_id()).await?;
    Ok(response::success(user))
}

/// 更新当前用户资料
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Response> {
    let user = state.sessions.update_profile(auth.user_id(), update).await?;
    Ok(response::success_with_message(user, "用户信息已更新"))
}

/// 修改密码，成功后吊销全部刷新令牌
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Response> {
    state
        .sessions
        .change_password(auth.user_id(), &request.old_password, &request.new_password)
        .await?;
    Ok(response::success_without_data("密码已修改，请重新登录"))
}

/// 当前用户的有效权限
pub async fn my_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    let keys = state.rbac.user_permissions(auth.user_id()).await?;
    Ok(response::success(keys))
}

/// 当前用户可见的路由树
pub async fn my_routes(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    let routes = state.rbac.user_route_tree(auth.user_id()).await?;
    Ok(response::success(routes))
}
