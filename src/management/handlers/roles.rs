//! # 角色管理处理器
//!
//! 角色 CRUD、角色权限分配与用户角色分配

use axum::extract::{Extension, Json, Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;
use crate::store::{NewRole, PageQuery, RoleChanges};

/// 角色权限分配请求体
#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub keys: Vec<String>,
}

/// 用户角色分配请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRolesRequest {
    pub role_ids: Vec<i32>,
}

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:list").await?;
    let page = state.rbac.list_roles(query).await?;
    Ok(response::success(page))
}

pub async fn get_role(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:read").await?;
    let role = state.rbac.get_role(id).await?;
    Ok(response::success(role))
}

pub async fn create_role(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(role): Json<NewRole>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:create").await?;
    let role = state.rbac.create_role(role).await?;
    Ok(response::created(role))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
    Json(changes): Json<RoleChanges>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:update").await?;
    let role = state.rbac.update_role(id, changes).await?;
    Ok(response::success_with_message(role, "角色已更新"))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:delete").await?;
    state.rbac.delete_role(id).await?;
    Ok(response::success_without_data("角色已删除"))
}

pub async fn get_role_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:read").await?;
    let permissions = state.rbac.role_permissions(id).await?;
    Ok(response::success(permissions))
}

pub async fn set_role_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
    Json(request): Json<SetPermissionsRequest>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:update").await?;
    let permissions = state.rbac.set_role_permissions(id, &request.keys).await?;
    Ok(response::success_with_message(permissions, "角色权限已更新"))
}

pub async fn get_user_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(user_id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:read").await?;
    let roles = state.rbac.user_roles(user_id).await?;
    Ok(response::success(roles))
}

pub async fn set_user_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(user_id): Path<i32>,
    Json(request): Json<SetRolesRequest>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:update").await?;
    let roles = state.rbac.set_user_roles(user_id, &request.role_ids).await?;
    Ok(response::success_with_message(roles, "用户角色已更新"))
}

/// 用户的有效权限 key
pub async fn get_user_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(user_id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "roles:read").await?;
    let keys = state.rbac.user_permissions(user_id).await?;
    Ok(response::success(keys))
}
