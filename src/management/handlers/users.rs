//! # 用户管理处理器

use axum::extract::{Extension, Json, Path, Query, State};
use axum::response::Response;
use std::sync::Arc;

use crate::auth::{RegisterRequest, UserUpdate};
use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;
use crate::store::UserQuery;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Query(query): Query<UserQuery>,
) -> Result<Response> {
    state.gate.require(&auth.user, "users:list").await?;
    let page = state.users.list_users(query).await?;
    Ok(response::success(page))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "users:read").await?;
    let user = state.users.get_user(id).await?;
    Ok(response::success(user))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    state.gate.require(&auth.user, "users:create").await?;
    let user = state.users.create_user(request).await?;
    Ok(response::created(user))
}

/// 管理员更新用户；提供 `password` 时该用户的全部会话失效
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
    Json(update): Json<UserUpdate>,
) -> Result<Response> {
    state.gate.require(&auth.user, "users:update").await?;
    let user = state.users.update_user(id, update).await?;
    Ok(response::success_with_message(user, "用户已更新"))
}
